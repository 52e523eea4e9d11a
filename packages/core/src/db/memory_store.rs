//! In-process record store
//!
//! `MemoryStore` keeps records in a `HashMap` behind a `RwLock`. Each write
//! evaluates its condition and applies under one write-lock acquisition, which
//! gives the same per-record atomicity a real key-value store offers for
//! conditional writes. The lock is never held across an `.await`.
//!
//! Secondary index lookups scan the map; the store is meant for tests,
//! tooling and small embedded deployments.
//!
//! # Fault injection
//!
//! [`MemoryStore::inject_conflict`] and [`MemoryStore::inject_error`] arm a
//! one-shot failure for the next write to a key, which is how partial failures
//! of multi-write operations are exercised in tests.

use crate::db::{Condition, DatabaseError, Record, RecordChanges, RecordStore, WriteOutcome};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Conflict,
    Error,
}

/// Record store backed by an in-process map
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
    faults: Mutex<HashMap<String, Fault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records` (no chain validation)
    pub fn with_records(records: Vec<Record>) -> Self {
        let records = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self {
            records: RwLock::new(records),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Next write to `key` reports `ConditionFailed` without applying
    pub fn inject_conflict(&self, key: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(key.to_string(), Fault::Conflict);
        }
    }

    /// Next write to `key` fails with `DatabaseError::InjectedFailure`
    pub fn inject_error(&self, key: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(key.to_string(), Fault::Error);
        }
    }

    /// Snapshot of every stored record, sorted by key
    pub fn snapshot(&self) -> Result<Vec<Record>, DatabaseError> {
        let records = self.read()?;
        let mut all: Vec<Record> = records.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }

    pub fn len(&self) -> Result<usize, DatabaseError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, DatabaseError> {
        Ok(self.read()?.is_empty())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Record>>, DatabaseError> {
        self.records
            .read()
            .map_err(|_| DatabaseError::lock_poisoned("Failed to acquire read lock"))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Record>>, DatabaseError> {
        self.records
            .write()
            .map_err(|_| DatabaseError::lock_poisoned("Failed to acquire write lock"))
    }

    /// Consume an armed fault for `key`, if any
    fn take_fault(&self, key: &str) -> Result<Option<WriteOutcome>, DatabaseError> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| DatabaseError::lock_poisoned("Failed to acquire fault lock"))?;
        match faults.remove(key) {
            Some(Fault::Conflict) => Ok(Some(WriteOutcome::ConditionFailed)),
            Some(Fault::Error) => Err(DatabaseError::InjectedFailure {
                key: key.to_string(),
            }),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, DatabaseError> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn put(
        &self,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError> {
        if let Some(outcome) = self.take_fault(&record.key)? {
            return Ok(outcome);
        }

        let mut records = self.write()?;
        if let Some(condition) = &condition {
            let current = records.get(&record.key);
            // Successor conditions replace an existing record in place
            if current.is_none() && *condition != Condition::NotExists {
                return Ok(WriteOutcome::Missing);
            }
            if !condition.holds(current) {
                return Ok(WriteOutcome::ConditionFailed);
            }
        }
        records.insert(record.key.clone(), record);
        Ok(WriteOutcome::Applied)
    }

    async fn update(
        &self,
        key: &str,
        changes: RecordChanges,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError> {
        if let Some(outcome) = self.take_fault(key)? {
            return Ok(outcome);
        }

        let mut records = self.write()?;
        let Some(current) = records.get_mut(key) else {
            return Ok(WriteOutcome::Missing);
        };
        if let Some(condition) = &condition {
            if !condition.holds(Some(current)) {
                return Ok(WriteOutcome::ConditionFailed);
            }
        }
        changes.apply_to(current);
        Ok(WriteOutcome::Applied)
    }

    async fn delete(
        &self,
        key: &str,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError> {
        if let Some(outcome) = self.take_fault(key)? {
            return Ok(outcome);
        }

        let mut records = self.write()?;
        match (&condition, records.get(key)) {
            (None, _) => {}
            (Some(_), None) => return Ok(WriteOutcome::Missing),
            (Some(condition), current) => {
                if !condition.holds(current) {
                    return Ok(WriteOutcome::ConditionFailed);
                }
            }
        }
        records.remove(key);
        Ok(WriteOutcome::Applied)
    }

    async fn set_metadata_entry(
        &self,
        key: &str,
        name: &str,
        value: Value,
    ) -> Result<WriteOutcome, DatabaseError> {
        if let Some(outcome) = self.take_fault(key)? {
            return Ok(outcome);
        }

        let mut records = self.write()?;
        let Some(current) = records.get_mut(key) else {
            return Ok(WriteOutcome::Missing);
        };
        match current.metadata.as_mut() {
            Some(metadata) => {
                metadata.insert(name.to_string(), value);
                Ok(WriteOutcome::Applied)
            }
            None => Err(DatabaseError::metadata_missing(key)),
        }
    }

    async fn by_collection(&self, collection: &str) -> Result<Vec<Record>, DatabaseError> {
        Ok(self
            .read()?
            .values()
            .filter(|r| r.collection == collection)
            .cloned()
            .collect())
    }

    async fn by_collection_and_successor(
        &self,
        collection: &str,
        successor: &str,
    ) -> Result<Option<Record>, DatabaseError> {
        let records = self.read()?;
        let mut matches = records
            .values()
            .filter(|r| r.collection == collection && r.successor == successor);
        let first = matches.next().cloned();
        if matches.next().is_some() {
            tracing::warn!(
                "Collection '{}' has several records pointing at '{}'",
                collection,
                successor
            );
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{RecordBody, TAIL};
    use serde_json::json;

    fn member(key: &str, successor: &str) -> Record {
        Record::member(key, "c", successor, RecordBody::text(key))
    }

    #[tokio::test]
    async fn test_guarded_create_rejects_existing_key() {
        let store = MemoryStore::new();
        let first = store.put(member("a", TAIL), Some(Condition::NotExists)).await.unwrap();
        let second = store.put(member("a", "b"), Some(Condition::NotExists)).await.unwrap();

        assert_eq!(first, WriteOutcome::Applied);
        assert_eq!(second, WriteOutcome::ConditionFailed);
        assert_eq!(store.get("a").await.unwrap().unwrap().successor, TAIL);

        let absent = store
            .put(member("z", TAIL), Some(Condition::SuccessorEquals("b".into())))
            .await
            .unwrap();
        assert_eq!(absent, WriteOutcome::Missing);
        assert!(store.get("z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_update_and_missing() {
        let store = MemoryStore::with_records(vec![member("a", "b")]);

        let stale = store
            .update(
                "a",
                RecordChanges::successor("c"),
                Some(Condition::SuccessorEquals("x".into())),
            )
            .await
            .unwrap();
        assert_eq!(stale, WriteOutcome::ConditionFailed);

        let fresh = store
            .update(
                "a",
                RecordChanges::successor("c"),
                Some(Condition::SuccessorEquals("b".into())),
            )
            .await
            .unwrap();
        assert_eq!(fresh, WriteOutcome::Applied);
        assert_eq!(store.get("a").await.unwrap().unwrap().successor, "c");

        let missing = store
            .update("zz", RecordChanges::successor("c"), None)
            .await
            .unwrap();
        assert_eq!(missing, WriteOutcome::Missing);
    }

    #[tokio::test]
    async fn test_delete_semantics() {
        let store = MemoryStore::with_records(vec![member("a", "b")]);

        assert_eq!(store.delete("nope", None).await.unwrap(), WriteOutcome::Applied);
        assert_eq!(
            store
                .delete("nope", Some(Condition::SuccessorEquals("b".into())))
                .await
                .unwrap(),
            WriteOutcome::Missing
        );
        assert_eq!(
            store
                .delete("a", Some(Condition::SuccessorEquals("x".into())))
                .await
                .unwrap(),
            WriteOutcome::ConditionFailed
        );
        assert_eq!(
            store
                .delete("a", Some(Condition::SuccessorEquals("b".into())))
                .await
                .unwrap(),
            WriteOutcome::Applied
        );
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_nested_metadata_requires_existing_map() {
        let store = MemoryStore::with_records(vec![member("a", TAIL)]);

        let err = store
            .set_metadata_entry("a", "isOpened", json!(true))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MetadataMissing { .. }));

        store
            .update(
                "a",
                RecordChanges::metadata(json!({"isOpened": true}).as_object().cloned().unwrap()),
                None,
            )
            .await
            .unwrap();
        let outcome = store
            .set_metadata_entry("a", "color", json!("red"))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);

        let record = store.get("a").await.unwrap().unwrap();
        assert_eq!(
            record.metadata.unwrap(),
            json!({"isOpened": true, "color": "red"}).as_object().cloned().unwrap()
        );
    }

    #[tokio::test]
    async fn test_secondary_indexes() {
        let mut other = member("x", TAIL);
        other.collection = "other".to_string();
        let store = MemoryStore::with_records(vec![
            Record::head_pointing_at("c", "a"),
            member("a", "b"),
            member("b", TAIL),
            other,
        ]);

        let mut keys: Vec<String> = store
            .by_collection("c")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["#c", "a", "b"]);

        let tail = store.by_collection_and_successor("c", TAIL).await.unwrap();
        assert_eq!(tail.unwrap().key, "b");

        let pointing_at_a = store.by_collection_and_successor("c", "a").await.unwrap();
        assert_eq!(pointing_at_a.unwrap().key, "#c");

        assert!(store
            .by_collection_and_successor("c", "x")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_injected_faults_fire_once() {
        let store = MemoryStore::with_records(vec![member("a", TAIL)]);

        store.inject_conflict("a");
        let outcome = store.update("a", RecordChanges::successor("b"), None).await.unwrap();
        assert_eq!(outcome, WriteOutcome::ConditionFailed);

        store.inject_error("a");
        assert!(store.delete("a", None).await.is_err());

        let outcome = store.update("a", RecordChanges::successor("b"), None).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
    }
}
