//! RecordStore Trait - Point Access Abstraction
//!
//! This module defines the `RecordStore` trait that abstracts the backing
//! key-value store. The ordering driver is written against this trait only,
//! so the same linked-list algorithms run over the in-memory store (tests,
//! tooling) and the libsql store (persistent deployments).
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked
//!    backends share one interface
//! 2. **Point access only**: There is no "read the whole list" primitive besides
//!    the unordered `by_collection` index query
//! 3. **Conditions are outcomes, not errors**: a failed predicate returns
//!    `WriteOutcome::ConditionFailed`; `Err` is reserved for backend failures
//! 4. **No transactions**: every call is a single-record operation
//!
//! # Examples
//!
//! ```rust,no_run
//! use nodechain_core::db::{Condition, MemoryStore, Record, RecordBody, RecordStore, TAIL};
//!
//! # async fn example() -> Result<(), nodechain_core::db::DatabaseError> {
//! let store = MemoryStore::new();
//! let record = Record::member("a", "node:home", TAIL, RecordBody::text("A"));
//! let outcome = store.put(record, Some(Condition::NotExists)).await?;
//! assert!(outcome.is_applied());
//! # Ok(())
//! # }
//! ```

use crate::db::{Condition, DatabaseError, Record, RecordChanges, WriteOutcome};
use async_trait::async_trait;
use serde_json::Value;

/// Point-access record storage with two secondary indexes
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the driver issues several calls
/// concurrently from one task.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a record by primary key
    ///
    /// Returns `Ok(None)` when the key is absent (not an error).
    async fn get(&self, key: &str) -> Result<Option<Record>, DatabaseError>;

    /// Create or replace a whole record
    ///
    /// With `Condition::NotExists` this is a guarded create. Successor
    /// conditions require the record to exist; an absent key is `Missing`.
    async fn put(
        &self,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError>;

    /// Rewrite only the fields named in `changes`
    ///
    /// Returns `WriteOutcome::Missing` when the key is absent.
    async fn update(
        &self,
        key: &str,
        changes: RecordChanges,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError>;

    /// Delete a record
    ///
    /// An unconditional delete of an absent key is `Applied` (idempotent); a
    /// conditional delete of an absent key is `Missing`.
    async fn delete(
        &self,
        key: &str,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError>;

    /// Set one metadata sub-key without reading or rewriting the whole map
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::MetadataMissing` when the record exists but has
    /// no metadata map yet. Callers fall back to replacing the whole map.
    async fn set_metadata_entry(
        &self,
        key: &str,
        name: &str,
        value: Value,
    ) -> Result<WriteOutcome, DatabaseError>;

    /// All records of a collection, in no particular order (head included)
    async fn by_collection(&self, collection: &str) -> Result<Vec<Record>, DatabaseError>;

    /// The record of `collection` whose successor equals `successor`
    ///
    /// Expected cardinality is at most one. When the chain is corrupted and
    /// several records match, implementations log a warning and return one.
    async fn by_collection_and_successor(
        &self,
        collection: &str,
        successor: &str,
    ) -> Result<Option<Record>, DatabaseError>;
}
