//! Service Layer Error Types
//!
//! Repository-level errors. Driver failures are translated into the domain
//! vocabulary here so callers never match on list internals.

use crate::db::DatabaseError;
use crate::ordering::OrderingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// No entity of this kind with the given id
    #[error("Model not found: {id}")]
    ModelNotFound { id: String },

    /// Lost a race against a concurrent change; nothing was written
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// Stored state is inconsistent (broken chain, undecodable record)
    #[error("Corrupted data: {reason}")]
    Corrupted { reason: String },

    /// Request rejected before anything was written
    #[error("Invalid request: {reason}")]
    Invalid { reason: String },

    /// Database operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl ServiceError {
    pub fn model_not_found(id: impl Into<String>) -> Self {
        Self::ModelNotFound { id: id.into() }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted {
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Whether the caller should re-list before retrying
    pub fn requires_reload(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Corrupted { .. })
    }
}

impl From<OrderingError> for ServiceError {
    fn from(err: OrderingError) -> Self {
        match err {
            OrderingError::NotFound { key } => Self::ModelNotFound { id: key },
            OrderingError::WriteConflict { .. } | OrderingError::InsertConflict { .. } => {
                Self::conflict(err.to_string())
            }
            OrderingError::OrphanRecord { .. } | OrderingError::PartialFailure { .. } => {
                Self::corrupted(err.to_string())
            }
            OrderingError::InvalidKey { .. } | OrderingError::InvalidOperation { .. } => {
                Self::invalid(err.to_string())
            }
            OrderingError::Database(e) => Self::Storage(e),
        }
    }
}
