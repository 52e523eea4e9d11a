//! Ordered Collection Driver
//!
//! The linked-list algorithms over a [`RecordStore`]: insert-after, delete,
//! move-after and order reconstruction. One implementation serves every
//! entity kind; entity adapters only decide collection keys and bodies.
//!
//! # Write protocol
//!
//! Each mutating operation first issues its point reads concurrently, then
//! issues its two or three point writes concurrently. Every write carries its
//! own condition; there is no lock and no retry. When only some writes land the
//! operation fails with [`OrderingError::PartialFailure`] and, if journaling is
//! enabled, its [`WriteIntent`] stays pending.
//!
//! # Examples
//!
//! ```rust,no_run
//! use nodechain_core::db::{MemoryStore, RecordBody};
//! use nodechain_core::ordering::CollectionDriver;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), nodechain_core::ordering::OrderingError> {
//! let driver = CollectionDriver::new(Arc::new(MemoryStore::new()));
//! driver.insert("a", "node:home", RecordBody::text("A"), None).await?;
//! driver.insert("b", "node:home", RecordBody::text("B"), None).await?;
//! driver.insert("c", "node:home", RecordBody::text("C"), Some("a")).await?;
//!
//! let keys: Vec<String> = driver.list("node:home").await?.into_iter().map(|r| r.key).collect();
//! assert_eq!(keys, vec!["a", "c", "b"]);
//! # Ok(())
//! # }
//! ```

use crate::config::OrderingConfig;
use crate::db::{
    head_key, is_reserved_key, Condition, DatabaseError, Record, RecordBody, RecordChanges,
    RecordStore, WriteOutcome, HEAD_PREFIX, JOURNAL_PREFIX, TAIL,
};
use crate::ordering::follow::follow;
use crate::ordering::intent::{self, WriteIntent};
use crate::ordering::{ChainReport, Operation, OrderingError};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Content/kind changes applied by [`CollectionDriver::update`]
///
/// Pointers and metadata are deliberately absent: position is owned by the
/// driver and metadata goes through [`CollectionDriver::metadata`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyPatch {
    pub content: Option<String>,
    /// Double-Option: `Some(None)` clears the kind
    pub kind: Option<Option<String>>,
}

impl BodyPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            kind: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.kind.is_none()
    }
}

impl From<BodyPatch> for RecordChanges {
    fn from(patch: BodyPatch) -> Self {
        RecordChanges {
            content: patch.content,
            kind: patch.kind,
            ..Default::default()
        }
    }
}

/// One point write of a multi-write operation
struct WriteStep {
    key: String,
    result: Result<WriteOutcome, DatabaseError>,
}

impl WriteStep {
    fn new(key: &str, result: Result<WriteOutcome, DatabaseError>) -> Self {
        Self {
            key: key.to_string(),
            result,
        }
    }

    fn applied(&self) -> bool {
        matches!(self.result, Ok(WriteOutcome::Applied))
    }
}

/// Linked-list driver over a record store
pub struct CollectionDriver<S>
where
    S: RecordStore + ?Sized,
{
    store: Arc<S>,
    config: OrderingConfig,
}

impl<S> Clone for CollectionDriver<S>
where
    S: RecordStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S> CollectionDriver<S>
where
    S: RecordStore + ?Sized,
{
    /// Driver with default configuration (intent journaling on)
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, OrderingConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: OrderingConfig) -> Self {
        Self { store, config }
    }

    /// The underlying record store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &OrderingConfig {
        &self.config
    }

    /// Members of `collection` in sibling order
    ///
    /// Reads the collection index once and follows successor pointers from the
    /// head in memory. A missing head or a head pointing at the tail sentinel
    /// yields an empty list. A corrupted chain yields its reachable prefix and
    /// a warning.
    pub async fn list(&self, collection: &str) -> Result<Vec<Record>, OrderingError> {
        let records = self.store.by_collection(collection).await?;
        let followed = follow(collection, records);

        if let Some(anomaly) = &followed.anomaly {
            tracing::warn!(
                "Chain of collection '{}' is broken ({:?}); returning {} reachable record(s)",
                collection,
                anomaly,
                followed.ordered.len()
            );
        }
        if !followed.unreachable.is_empty() {
            tracing::warn!(
                "Collection '{}' has {} record(s) unreachable from its head",
                collection,
                followed.unreachable.len()
            );
        }

        Ok(followed.ordered)
    }

    /// Fetch one member record
    pub async fn get(&self, key: &str) -> Result<Option<Record>, OrderingError> {
        validate_member_key(key)?;
        Ok(self.store.get(key).await?)
    }

    /// Insert `key` into `collection` after `after_key`, or append when `None`
    ///
    /// `after_key` may also be the collection's head key, which inserts at the
    /// front.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `after_key` does not exist
    /// - `InsertConflict` if the predecessor changed since it was read, the key
    ///   already exists, or another writer created the collection first
    /// - `PartialFailure` if only one of the two writes landed
    pub async fn insert(
        &self,
        key: &str,
        collection: &str,
        body: RecordBody,
        after_key: Option<&str>,
    ) -> Result<Record, OrderingError> {
        validate_member_key(key)?;
        validate_collection(collection)?;
        if after_key == Some(key) {
            return Err(OrderingError::invalid_operation(format!(
                "cannot insert '{}' after itself",
                key
            )));
        }

        if let Some(after) = after_key {
            if after.starts_with(JOURNAL_PREFIX) {
                return Err(OrderingError::invalid_key(after, "journal keys are not list members"));
            }
        }

        let predecessor_lookup = async {
            match after_key {
                Some(after) => self.store.get(after).await,
                None => self.store.by_collection_and_successor(collection, TAIL).await,
            }
        };
        let (existing, predecessor) = tokio::join!(self.store.get(key), predecessor_lookup);

        if let Some(existing) = existing? {
            tracing::debug!(
                "Rejecting insert of '{}' into '{}': key already stored in '{}'",
                key,
                collection,
                existing.collection
            );
            return Err(OrderingError::insert_conflict(key, collection));
        }

        let predecessor = match (after_key, predecessor?) {
            (Some(after), None) => return Err(OrderingError::not_found(after)),
            (Some(_), Some(record)) => {
                ensure_same_collection(&record, collection)?;
                Some(record)
            }
            (None, tail) => tail,
        };

        match predecessor {
            None => self.insert_into_empty(key, collection, body).await,
            Some(predecessor) => self.insert_after(key, collection, body, predecessor).await,
        }
    }

    /// First insert into a collection: create its head and the record
    async fn insert_into_empty(
        &self,
        key: &str,
        collection: &str,
        body: RecordBody,
    ) -> Result<Record, OrderingError> {
        tracing::debug!("Creating collection '{}' with first record '{}'", collection, key);

        let head = Record::head_pointing_at(collection, key);
        let head_key = head.key.clone();
        let record = Record::member(key, collection, TAIL, body);

        let intent = self
            .begin(Operation::Insert, collection, vec![head_key.clone(), key.to_string()])
            .await?;

        let (head_result, record_result) = tokio::join!(
            self.store.put(head, Some(Condition::NotExists)),
            self.store.put(record.clone(), Some(Condition::NotExists)),
        );

        let result = settle(
            Operation::Insert,
            collection,
            key,
            vec![
                WriteStep::new(&head_key, head_result),
                WriteStep::new(key, record_result),
            ],
        );
        self.finish(intent, &result).await;
        result.map(|_| record)
    }

    /// Link `key` between `predecessor` and its current successor
    async fn insert_after(
        &self,
        key: &str,
        collection: &str,
        body: RecordBody,
        predecessor: Record,
    ) -> Result<Record, OrderingError> {
        tracing::debug!(
            "Inserting '{}' after '{}' in collection '{}'",
            key,
            predecessor.key,
            collection
        );

        let old_successor = predecessor.successor.clone();
        let record = Record::member(key, collection, &old_successor, body);

        let intent = self
            .begin(
                Operation::Insert,
                collection,
                vec![predecessor.key.clone(), key.to_string()],
            )
            .await?;

        let (link_result, create_result) = tokio::join!(
            self.store.update(
                &predecessor.key,
                RecordChanges::successor(key),
                Some(Condition::SuccessorEquals(old_successor.clone())),
            ),
            self.store.put(record.clone(), Some(Condition::NotExists)),
        );

        let result = settle(
            Operation::Insert,
            collection,
            key,
            vec![
                WriteStep::new(&predecessor.key, link_result),
                WriteStep::new(key, create_result),
            ],
        );
        self.finish(intent, &result).await;
        result.map(|_| record)
    }

    /// Remove `key` from its collection and repair the chain
    ///
    /// Deleting an absent key succeeds without writing.
    ///
    /// # Errors
    ///
    /// - `OrphanRecord` if no record points at `key`
    /// - `WriteConflict` if both conditional writes were rejected
    /// - `PartialFailure` if only one landed
    pub async fn delete(&self, key: &str) -> Result<(), OrderingError> {
        validate_member_key(key)?;

        let Some(record) = self.store.get(key).await? else {
            tracing::debug!("Delete of absent record '{}' is a no-op", key);
            return Ok(());
        };
        let collection = record.collection.clone();

        let predecessor = self
            .store
            .by_collection_and_successor(&collection, key)
            .await?
            .ok_or_else(|| OrderingError::orphan_record(key, &collection))?;

        tracing::debug!(
            "Deleting '{}' from collection '{}' (predecessor '{}', successor '{}')",
            key,
            collection,
            predecessor.key,
            record.successor
        );

        let intent = self
            .begin(
                Operation::Delete,
                &collection,
                vec![predecessor.key.clone(), key.to_string()],
            )
            .await?;

        let (relink_result, remove_result) = tokio::join!(
            self.store.update(
                &predecessor.key,
                RecordChanges::successor(record.successor.clone()),
                Some(Condition::SuccessorEquals(key.to_string())),
            ),
            self.store.delete(
                key,
                Some(Condition::SuccessorEquals(record.successor.clone())),
            ),
        );

        let result = settle(
            Operation::Delete,
            &collection,
            key,
            vec![
                WriteStep::new(&predecessor.key, relink_result),
                WriteStep::new(key, remove_result),
            ],
        );
        self.finish(intent, &result).await;
        result
    }

    /// Move `key` to just after `after_key` (front of the list when `None`)
    ///
    /// Moving a record onto itself or to the position it already occupies
    /// succeeds without writing.
    ///
    /// Each of the three pointer writes is guarded only against re-applying the
    /// same value; it is not an optimistic lock on the whole read snapshot.
    pub async fn move_after(
        &self,
        key: &str,
        collection: &str,
        after_key: Option<&str>,
    ) -> Result<(), OrderingError> {
        validate_member_key(key)?;
        if after_key == Some(key) {
            tracing::debug!("Move of '{}' after itself is a no-op", key);
            return Ok(());
        }
        if let Some(after) = after_key {
            validate_member_key(after)?;
        }
        let after_key = after_key
            .map(str::to_string)
            .unwrap_or_else(|| head_key(collection));

        let (from, after, from_predecessor) = tokio::join!(
            self.store.get(key),
            self.store.get(&after_key),
            self.store.by_collection_and_successor(collection, key),
        );

        let from = from?.ok_or_else(|| OrderingError::not_found(key))?;
        ensure_same_collection(&from, collection)?;
        let after = after?.ok_or_else(|| OrderingError::not_found(&after_key))?;
        ensure_same_collection(&after, collection)?;

        if after.successor == from.key {
            tracing::debug!("'{}' already follows '{}'", key, after.key);
            return Ok(());
        }

        let from_predecessor =
            from_predecessor?.ok_or_else(|| OrderingError::orphan_record(key, collection))?;

        tracing::debug!(
            "Moving '{}' after '{}' in collection '{}'",
            key,
            after.key,
            collection
        );

        // Captured before any write
        let after_old_successor = after.successor.clone();
        let from_old_successor = from.successor.clone();

        let intent = self
            .begin(
                Operation::Move,
                collection,
                vec![
                    from.key.clone(),
                    after.key.clone(),
                    from_predecessor.key.clone(),
                ],
            )
            .await?;

        let (from_result, after_result, predecessor_result) = tokio::join!(
            self.store.update(
                &from.key,
                RecordChanges::successor(after_old_successor.clone()),
                Some(Condition::SuccessorNotEquals(after_old_successor.clone())),
            ),
            self.store.update(
                &after.key,
                RecordChanges::successor(from.key.clone()),
                Some(Condition::SuccessorNotEquals(from.key.clone())),
            ),
            self.store.update(
                &from_predecessor.key,
                RecordChanges::successor(from_old_successor.clone()),
                Some(Condition::SuccessorNotEquals(from_old_successor.clone())),
            ),
        );

        let result = settle(
            Operation::Move,
            collection,
            key,
            vec![
                WriteStep::new(&from.key, from_result),
                WriteStep::new(&after.key, after_result),
                WriteStep::new(&from_predecessor.key, predecessor_result),
            ],
        );
        self.finish(intent, &result).await;
        result
    }

    /// Rewrite content and/or kind in place; metadata and pointers are untouched
    pub async fn update(&self, key: &str, patch: BodyPatch) -> Result<Record, OrderingError> {
        validate_member_key(key)?;

        if !patch.is_empty() {
            match self.store.update(key, patch.into(), None).await? {
                WriteOutcome::Applied => {}
                WriteOutcome::Missing => return Err(OrderingError::not_found(key)),
                WriteOutcome::ConditionFailed => {
                    return Err(OrderingError::invalid_operation(format!(
                        "update of '{}' was rejected",
                        key
                    )))
                }
            }
        }

        self.store
            .get(key)
            .await?
            .ok_or_else(|| OrderingError::not_found(key))
    }

    /// Shallow-merge `entries` into the record's metadata
    ///
    /// Each entry is written as a nested update so the rest of the map is
    /// neither read nor rewritten. When the store rejects the nested writes
    /// because the record has no metadata map yet, the map is created once
    /// from `entries`.
    pub async fn metadata(
        &self,
        key: &str,
        entries: Map<String, Value>,
    ) -> Result<Record, OrderingError> {
        validate_member_key(key)?;

        let results = join_all(
            entries
                .iter()
                .map(|(name, value)| self.store.set_metadata_entry(key, name, value.clone())),
        )
        .await;

        let mut needs_map = false;
        for result in results {
            match result {
                Ok(WriteOutcome::Applied) => {}
                Ok(WriteOutcome::Missing) => return Err(OrderingError::not_found(key)),
                Ok(WriteOutcome::ConditionFailed) => {
                    return Err(OrderingError::invalid_operation(format!(
                        "metadata write to '{}' was rejected",
                        key
                    )))
                }
                Err(DatabaseError::MetadataMissing { .. }) => needs_map = true,
                Err(e) => return Err(e.into()),
            }
        }

        if needs_map {
            tracing::debug!("Record '{}' has no metadata map; writing it whole", key);
            match self
                .store
                .update(key, RecordChanges::metadata(entries), None)
                .await?
            {
                WriteOutcome::Applied => {}
                WriteOutcome::Missing => return Err(OrderingError::not_found(key)),
                WriteOutcome::ConditionFailed => {
                    return Err(OrderingError::invalid_operation(format!(
                        "metadata write to '{}' was rejected",
                        key
                    )))
                }
            }
        }

        self.store
            .get(key)
            .await?
            .ok_or_else(|| OrderingError::not_found(key))
    }

    /// Intents of operations that partially applied
    pub async fn pending_intents(&self) -> Result<Vec<WriteIntent>, OrderingError> {
        Ok(intent::pending(self.store.as_ref()).await?)
    }

    /// Check the list invariants of `collection`
    pub async fn verify(&self, collection: &str) -> Result<ChainReport, OrderingError> {
        let records = self.store.by_collection(collection).await?;
        Ok(ChainReport::from_records(collection, records))
    }

    async fn begin(
        &self,
        operation: Operation,
        collection: &str,
        keys: Vec<String>,
    ) -> Result<Option<WriteIntent>, OrderingError> {
        if !self.config.journal_intents {
            return Ok(None);
        }
        let intent = WriteIntent::new(operation, collection, keys);
        intent::open(self.store.as_ref(), &intent).await?;
        Ok(Some(intent))
    }

    async fn finish(&self, intent: Option<WriteIntent>, result: &Result<(), OrderingError>) {
        let Some(intent) = intent else {
            return;
        };
        if matches!(result, Err(OrderingError::PartialFailure { .. })) {
            tracing::warn!(
                "Leaving intent '{}' pending for collection '{}'",
                intent.id,
                intent.collection
            );
            return;
        }
        if let Err(e) = intent::close(self.store.as_ref(), &intent).await {
            tracing::warn!("Failed to clear intent '{}': {}", intent.id, e);
        }
    }
}

/// Decide the outcome of a multi-write operation
fn settle(
    operation: Operation,
    collection: &str,
    key: &str,
    steps: Vec<WriteStep>,
) -> Result<(), OrderingError> {
    let (applied, failed): (Vec<WriteStep>, Vec<WriteStep>) =
        steps.into_iter().partition(WriteStep::applied);

    if failed.is_empty() {
        return Ok(());
    }

    if applied.is_empty() {
        let mut missing = None;
        for step in failed {
            match step.result {
                Err(e) => return Err(e.into()),
                Ok(WriteOutcome::Missing) if missing.is_none() => missing = Some(step.key),
                _ => {}
            }
        }
        return Err(match (operation, missing) {
            (Operation::Insert, _) => OrderingError::insert_conflict(key, collection),
            (_, Some(missing)) => OrderingError::not_found(missing),
            (_, None) => OrderingError::write_conflict(operation, key),
        });
    }

    let reasons: Vec<String> = failed
        .iter()
        .map(|step| match &step.result {
            Ok(outcome) => format!("{}: {:?}", step.key, outcome),
            Err(e) => format!("{}: {}", step.key, e),
        })
        .collect();
    let applied: Vec<String> = applied.into_iter().map(|s| s.key).collect();
    let failed: Vec<String> = failed.into_iter().map(|s| s.key).collect();

    tracing::error!(
        "Partial {} of '{}' in collection '{}': applied {:?}, failed [{}]; chain needs repair",
        operation,
        key,
        collection,
        applied,
        reasons.join(", ")
    );

    Err(OrderingError::PartialFailure {
        operation,
        collection: collection.to_string(),
        applied,
        failed,
    })
}

fn validate_member_key(key: &str) -> Result<(), OrderingError> {
    if is_reserved_key(key) {
        let reason = if key.is_empty() {
            "key must not be empty"
        } else if key.starts_with(HEAD_PREFIX) {
            "head keys are not list members"
        } else if key.starts_with(JOURNAL_PREFIX) {
            "journal keys are not list members"
        } else {
            "the tail sentinel is not a key"
        };
        return Err(OrderingError::invalid_key(key, reason));
    }
    Ok(())
}

fn validate_collection(collection: &str) -> Result<(), OrderingError> {
    if collection.is_empty() {
        return Err(OrderingError::invalid_operation("collection must not be empty"));
    }
    if collection.starts_with(JOURNAL_PREFIX) {
        return Err(OrderingError::invalid_operation(format!(
            "collection '{}' is reserved",
            collection
        )));
    }
    Ok(())
}

fn ensure_same_collection(record: &Record, collection: &str) -> Result<(), OrderingError> {
    if record.collection != collection {
        return Err(OrderingError::invalid_operation(format!(
            "'{}' belongs to collection '{}', not '{}'",
            record.key, record.collection, collection
        )));
    }
    Ok(())
}
