//! Database Layer
//!
//! This module handles all point access to the backing key-value store:
//!
//! - The persisted [`Record`] shape and the reserved key forms (heads, journal)
//! - Conditional writes ([`Condition`], [`WriteOutcome`])
//! - The [`RecordStore`] trait, including the two secondary index lookups
//!   the ordering driver relies on
//! - Backends: [`MemoryStore`] (in-process) and [`LibsqlStore`] (embedded libsql)
//!
//! # Architecture
//!
//! The store knows nothing about linked lists. It offers get/put/update/delete
//! of single records, each optionally guarded by a predicate that is evaluated
//! atomically against the stored value right before the write. List semantics
//! live one layer up, in [`crate::ordering`].

mod error;
mod libsql_store;
mod memory_store;
mod record;
mod record_store;

pub use error::DatabaseError;
pub use libsql_store::LibsqlStore;
pub use memory_store::MemoryStore;
pub use record::{
    head_key, is_reserved_key, Condition, Record, RecordBody, RecordChanges, WriteOutcome,
    HEAD_PREFIX, JOURNAL_PREFIX, TAIL,
};
pub use record_store::RecordStore;
