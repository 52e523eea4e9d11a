//! Write-intent journal
//!
//! Insert, delete and move each issue two or three writes that the store
//! cannot apply atomically. Before issuing them the driver stores a
//! [`WriteIntent`] describing the operation; once the operation resolves
//! without partial application the intent is removed. An intent that outlives
//! its operation marks a collection whose chain may be broken.
//!
//! Intents are ordinary records in the reserved `!intents` collection, so the
//! journal needs nothing from the store beyond the `RecordStore` trait.

use crate::db::{
    Condition, DatabaseError, Record, RecordBody, RecordStore, WriteOutcome, JOURNAL_PREFIX,
    TAIL,
};
use crate::ordering::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collection holding pending intents
pub const INTENT_COLLECTION: &str = "!intents";

/// A multi-write operation that has started and not yet resolved cleanly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteIntent {
    pub id: Uuid,
    pub operation: Operation,
    pub collection: String,
    /// Keys of every record the operation writes
    pub keys: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl WriteIntent {
    pub fn new(operation: Operation, collection: &str, keys: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            collection: collection.to_string(),
            keys,
            started_at: Utc::now(),
        }
    }

    /// Key of the journal record
    pub fn record_key(&self) -> String {
        format!("{}intent:{}", JOURNAL_PREFIX, self.id)
    }

    fn to_record(&self) -> Result<Record, DatabaseError> {
        let body = RecordBody::text(serde_json::to_string(self)?).with_kind("intent");
        Ok(Record::member(
            &self.record_key(),
            INTENT_COLLECTION,
            TAIL,
            body,
        ))
    }

    fn from_record(record: &Record) -> Result<Self, DatabaseError> {
        Ok(serde_json::from_str(&record.content)?)
    }
}

/// Persist `intent` before its writes are issued
pub(crate) async fn open<S>(store: &S, intent: &WriteIntent) -> Result<(), DatabaseError>
where
    S: RecordStore + ?Sized,
{
    let outcome = store
        .put(intent.to_record()?, Some(Condition::NotExists))
        .await?;
    match outcome {
        WriteOutcome::Applied => Ok(()),
        outcome => Err(DatabaseError::write_rejected(intent.record_key(), outcome)),
    }
}

/// Remove a resolved intent
pub(crate) async fn close<S>(store: &S, intent: &WriteIntent) -> Result<(), DatabaseError>
where
    S: RecordStore + ?Sized,
{
    store.delete(&intent.record_key(), None).await?;
    Ok(())
}

/// All intents left behind by partially applied operations, oldest first
pub async fn pending<S>(store: &S) -> Result<Vec<WriteIntent>, DatabaseError>
where
    S: RecordStore + ?Sized,
{
    let mut intents = Vec::new();
    for record in store.by_collection(INTENT_COLLECTION).await? {
        match WriteIntent::from_record(&record) {
            Ok(intent) => intents.push(intent),
            Err(e) => tracing::warn!("Skipping unreadable intent '{}': {}", record.key, e),
        }
    }
    intents.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    Ok(intents)
}
