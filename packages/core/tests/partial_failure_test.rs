//! Partial Failure and Write-Intent Journal Tests
//!
//! Insert, delete and move issue several independent conditional writes. These
//! tests arm one-shot faults on the in-process store to force every mix of
//! applied and rejected writes, and check that:
//! - a clean loss (nothing written) is a conflict and clears its intent
//! - a partial application is a distinct `PartialFailure`, leaves its intent
//!   pending and is visible to the chain verifier
//! - store errors surface as `OrderingError::Database`

#[cfg(test)]
mod partial_failure_tests {
    use anyhow::Result;
    use nodechain_core::db::{head_key, MemoryStore, RecordBody};
    use nodechain_core::models::Scope;
    use nodechain_core::ordering::{CollectionDriver, Operation, OrderingError};
    use nodechain_core::services::{NodeRepository, ServiceError};
    use std::sync::Arc;

    const C: &str = "node:home";

    async fn populated(keys: &[&str]) -> Result<CollectionDriver<MemoryStore>> {
        let driver = CollectionDriver::new(Arc::new(MemoryStore::new()));
        for key in keys {
            driver.insert(key, C, RecordBody::text(*key), None).await?;
        }
        Ok(driver)
    }

    #[tokio::test]
    async fn test_partial_delete_keeps_intent_and_breaks_chain() -> Result<()> {
        let driver = populated(&["a", "b", "c"]).await?;

        // Relink of `a` is rejected, removal of `b` lands
        driver.store().inject_conflict("a");
        let err = driver.delete("b").await.unwrap_err();

        match &err {
            OrderingError::PartialFailure {
                operation,
                collection,
                applied,
                failed,
            } => {
                assert_eq!(*operation, Operation::Delete);
                assert_eq!(collection, C);
                assert_eq!(applied, &vec!["b".to_string()]);
                assert_eq!(failed, &vec!["a".to_string()]);
            }
            other => panic!("expected PartialFailure, got {:?}", other),
        }
        assert!(err.leaves_state_unknown());

        let pending = driver.pending_intents().await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, Operation::Delete);
        assert!(pending[0].keys.contains(&"b".to_string()));

        // a -> b dangles now; listing returns the reachable prefix
        let listed: Vec<String> = driver.list(C).await?.into_iter().map(|r| r.key).collect();
        assert_eq!(listed, vec!["a"]);

        let report = driver.verify(C).await?;
        assert!(!report.is_consistent());
        assert!(report.anomaly.is_some());
        assert_eq!(report.unreachable, vec!["c"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_clean_move_conflict_clears_intent() -> Result<()> {
        let driver = populated(&["a", "b", "c"]).await?;

        driver.store().inject_conflict("c");
        driver.store().inject_conflict("b");
        driver.store().inject_conflict(&head_key(C));
        let err = driver.move_after("c", C, None).await.unwrap_err();

        assert!(matches!(
            err,
            OrderingError::WriteConflict {
                operation: Operation::Move,
                ..
            }
        ));
        assert!(driver.pending_intents().await?.is_empty());
        assert!(driver.verify(C).await?.is_consistent());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_error_on_one_write_is_partial() -> Result<()> {
        let driver = populated(&["a", "b"]).await?;

        driver.store().inject_error("c");
        let err = driver
            .insert("c", C, RecordBody::text("c"), None)
            .await
            .unwrap_err();

        // The tail link landed, the create failed
        assert!(matches!(err, OrderingError::PartialFailure { .. }));
        assert_eq!(driver.pending_intents().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_intents_accumulate_oldest_first() -> Result<()> {
        let driver = populated(&["a"]).await?;

        driver.store().inject_conflict("a");
        let _ = driver.insert("b", C, RecordBody::text("b"), None).await;

        // b is now a second tail; the link after it lands, the create of x does not
        driver.store().inject_conflict("x");
        let _ = driver.insert("x", C, RecordBody::text("x"), Some("b")).await;

        let pending = driver.pending_intents().await?;
        assert_eq!(pending.len(), 2);
        assert!(pending[0].started_at <= pending[1].started_at);
        assert!(pending.iter().all(|i| i.operation == Operation::Insert));
        Ok(())
    }

    #[tokio::test]
    async fn test_repository_reports_partial_failure_as_corruption() -> Result<()> {
        let driver = Arc::new(populated(&["a", "b"]).await?);
        let nodes = NodeRepository::new(driver.clone(), Scope::unscoped());

        driver.store().inject_conflict("a");
        let err = nodes.delete("b").await.unwrap_err();
        assert!(matches!(err, ServiceError::Corrupted { .. }));
        assert!(err.requires_reload());
        Ok(())
    }
}
