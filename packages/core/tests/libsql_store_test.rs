//! LibsqlStore Integration Tests
//!
//! Exercises the conditional-write contract of the libsql backend against a
//! real database file: each condition is evaluated by the statement's WHERE
//! clause and rows-affected decides the outcome.

#[cfg(test)]
mod libsql_store_tests {
    use anyhow::Result;
    use nodechain_core::db::{
        Condition, DatabaseError, LibsqlStore, Record, RecordBody, RecordChanges, RecordStore,
        WriteOutcome, TAIL,
    };
    use serde_json::json;
    use tempfile::TempDir;

    /// Helper to create test database
    async fn create_test_store() -> Result<(LibsqlStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let store = LibsqlStore::new(db_path).await?;
        Ok((store, temp_dir))
    }

    fn member(key: &str, successor: &str) -> Record {
        Record::member(key, "node:home", successor, RecordBody::text(key))
    }

    #[tokio::test]
    async fn test_guarded_create() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let outcome = store.put(member("a", TAIL), Some(Condition::NotExists)).await?;
        assert_eq!(outcome, WriteOutcome::Applied);

        let outcome = store.put(member("a", "b"), Some(Condition::NotExists)).await?;
        assert_eq!(outcome, WriteOutcome::ConditionFailed);
        assert_eq!(store.get("a").await?.map(|r| r.successor), Some(TAIL.to_string()));

        // Unconditional put overwrites
        store.put(member("a", "b"), None).await?;
        assert_eq!(store.get("a").await?.map(|r| r.successor), Some("b".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_successor_conditioned_put() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        store.put(member("a", "b"), None).await?;

        let replaced = store
            .put(member("a", "c"), Some(Condition::SuccessorEquals("b".into())))
            .await?;
        assert_eq!(replaced, WriteOutcome::Applied);

        let stale = store
            .put(member("a", "d"), Some(Condition::SuccessorEquals("b".into())))
            .await?;
        assert_eq!(stale, WriteOutcome::ConditionFailed);

        // Absent rows are reported the same way update and delete report them
        let absent = store
            .put(member("z", TAIL), Some(Condition::SuccessorNotEquals("x".into())))
            .await?;
        assert_eq!(absent, WriteOutcome::Missing);
        assert!(store.get("z").await?.is_none());
        assert_eq!(store.get("a").await?.map(|r| r.successor), Some("c".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_conditional_update_outcomes() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        store.put(member("a", "b"), None).await?;

        let applied = store
            .update(
                "a",
                RecordChanges::successor("c"),
                Some(Condition::SuccessorEquals("b".into())),
            )
            .await?;
        assert_eq!(applied, WriteOutcome::Applied);

        let stale = store
            .update(
                "a",
                RecordChanges::successor("d"),
                Some(Condition::SuccessorEquals("b".into())),
            )
            .await?;
        assert_eq!(stale, WriteOutcome::ConditionFailed);

        let same = store
            .update(
                "a",
                RecordChanges::successor("c"),
                Some(Condition::SuccessorNotEquals("c".into())),
            )
            .await?;
        assert_eq!(same, WriteOutcome::ConditionFailed);

        let missing = store
            .update("ghost", RecordChanges::successor("c"), None)
            .await?;
        assert_eq!(missing, WriteOutcome::Missing);

        let record = store.get("a").await?.expect("record a");
        assert_eq!(record.successor, "c");
        assert_eq!(record.content, "a");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_clears_kind_and_keeps_other_fields() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let body = RecordBody::text("x")
            .with_kind("task")
            .with_metadata(json!({"isOpened": true}).as_object().cloned().unwrap_or_default());
        store
            .put(Record::member("a", "node:home", TAIL, body), None)
            .await?;

        let changes = RecordChanges {
            kind: Some(None),
            ..Default::default()
        };
        store.update("a", changes, None).await?;

        let record = store.get("a").await?.expect("record a");
        assert_eq!(record.kind, None);
        assert_eq!(record.content, "x");
        assert!(record.metadata_flag("isOpened"));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_semantics() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        store.put(member("a", "b"), None).await?;

        let rejected = store
            .delete("a", Some(Condition::SuccessorEquals("x".into())))
            .await?;
        assert_eq!(rejected, WriteOutcome::ConditionFailed);
        assert!(store.get("a").await?.is_some());

        let removed = store
            .delete("a", Some(Condition::SuccessorEquals("b".into())))
            .await?;
        assert_eq!(removed, WriteOutcome::Applied);

        let missing = store
            .delete("a", Some(Condition::SuccessorEquals("b".into())))
            .await?;
        assert_eq!(missing, WriteOutcome::Missing);

        assert_eq!(store.delete("a", None).await?, WriteOutcome::Applied);
        Ok(())
    }

    #[tokio::test]
    async fn test_nested_metadata_requires_existing_map() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        store.put(member("bare", TAIL), None).await?;
        let with_map = RecordBody::text("m")
            .with_metadata(json!({"color": "red"}).as_object().cloned().unwrap_or_default());
        store
            .put(Record::member("mapped", "node:home", TAIL, with_map), None)
            .await?;

        let err = store
            .set_metadata_entry("bare", "isOpened", json!(true))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MetadataMissing { .. }));

        let outcome = store
            .set_metadata_entry("mapped", "isOpened", json!(true))
            .await?;
        assert_eq!(outcome, WriteOutcome::Applied);

        store
            .set_metadata_entry("mapped", "pin", json!({"n": 1}))
            .await?;

        let record = store.get("mapped").await?.expect("record mapped");
        assert_eq!(
            record.metadata.map(serde_json::Value::Object),
            Some(json!({"color": "red", "isOpened": true, "pin": {"n": 1}}))
        );

        let missing = store
            .set_metadata_entry("ghost", "isOpened", json!(true))
            .await?;
        assert_eq!(missing, WriteOutcome::Missing);
        Ok(())
    }

    #[tokio::test]
    async fn test_secondary_indexes() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        store.put(Record::head_pointing_at("node:home", "a"), None).await?;
        store.put(member("a", "b"), None).await?;
        store.put(member("b", TAIL), None).await?;
        store
            .put(Record::member("z", "node:other", TAIL, RecordBody::default()), None)
            .await?;

        let mut keys: Vec<String> = store
            .by_collection("node:home")
            .await?
            .into_iter()
            .map(|r| r.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["#node:home", "a", "b"]);

        let tail = store.by_collection_and_successor("node:home", TAIL).await?;
        assert_eq!(tail.map(|r| r.key), Some("b".to_string()));

        let predecessor = store.by_collection_and_successor("node:home", "b").await?;
        assert_eq!(predecessor.map(|r| r.key), Some("a".to_string()));

        assert!(store
            .by_collection_and_successor("node:other", "b")
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_records_persist_across_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("nested").join("persist.db");

        {
            let store = LibsqlStore::new(db_path.clone()).await?;
            store.put(member("a", TAIL), None).await?;
        }

        let store = LibsqlStore::with_busy_timeout(db_path, 1000).await?;
        let record = store.get("a").await?.expect("record a after reopen");
        assert_eq!(record, member("a", TAIL));
        Ok(())
    }
}
