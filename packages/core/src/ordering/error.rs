//! Error types for the collection driver
//!
//! A failed insert/delete/move means "state unknown": some of its writes may
//! have landed. [`OrderingError::PartialFailure`] is kept distinct from the
//! clean conflicts so callers and operators can tell a lost race (nothing
//! written) from a chain that now needs repair.

use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multi-write operations of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Insert,
    Delete,
    Move,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Insert => "insert",
            Operation::Delete => "delete",
            Operation::Move => "move",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during collection operations
#[derive(Error, Debug)]
pub enum OrderingError {
    /// Record absent where existence was required
    #[error("Record '{key}' does not exist")]
    NotFound { key: String },

    /// No record points at this one; the chain is already inconsistent
    #[error("Record '{key}' has no predecessor in collection '{collection}'")]
    OrphanRecord { key: String, collection: String },

    /// A conditional write lost a race; none of the operation's writes landed
    #[error("Write conflict during {operation} of '{key}'")]
    WriteConflict { operation: Operation, key: String },

    /// The predecessor changed (or the key already exists) while inserting
    #[error("Insert of '{key}' into collection '{collection}' lost a race")]
    InsertConflict { key: String, collection: String },

    /// Some writes of a multi-write operation landed and others did not
    ///
    /// The chain of `collection` may now violate its invariants.
    #[error("Partial {operation} in collection '{collection}': applied {applied:?}, failed {failed:?}")]
    PartialFailure {
        operation: Operation,
        collection: String,
        applied: Vec<String>,
        failed: Vec<String>,
    },

    /// Key is empty or uses a reserved form
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// The requested operation violates collection rules
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl OrderingError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn orphan_record(key: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::OrphanRecord {
            key: key.into(),
            collection: collection.into(),
        }
    }

    pub fn write_conflict(operation: Operation, key: impl Into<String>) -> Self {
        Self::WriteConflict {
            operation,
            key: key.into(),
        }
    }

    pub fn insert_conflict(key: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::InsertConflict {
            key: key.into(),
            collection: collection.into(),
        }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Whether the collection may have changed despite the failure
    ///
    /// Callers should re-list before retrying when this is true.
    pub fn leaves_state_unknown(&self) -> bool {
        matches!(
            self,
            Self::PartialFailure { .. }
                | Self::WriteConflict { .. }
                | Self::InsertConflict { .. }
                | Self::Database(_)
        )
    }
}
