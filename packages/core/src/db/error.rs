//! Database Error Types
//!
//! This module defines error types for record store operations, providing
//! clear error handling for connection, initialization, and query failures.

use crate::db::WriteOutcome;
use std::path::PathBuf;
use thiserror::Error;

/// Record store errors
///
/// Covers connection and schema failures of the persistent backend as well as
/// the store-level rejections every backend shares. A failed write condition
/// is NOT an error: it is reported as [`crate::db::WriteOutcome::ConditionFailed`].
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// Stored JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Nested metadata update rejected because the record has no metadata map yet
    #[error("Record '{key}' has no metadata map to update")]
    MetadataMissing { key: String },

    /// In-process store lock was poisoned by a panicking writer
    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),

    /// A guarded write that must land reported another outcome
    #[error("Write to record '{key}' was not applied: {outcome:?}")]
    WriteRejected { key: String, outcome: WriteOutcome },

    /// Failure injected by a test hook
    #[error("Injected store failure for record '{key}'")]
    InjectedFailure { key: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a metadata missing error
    pub fn metadata_missing(key: impl Into<String>) -> Self {
        Self::MetadataMissing { key: key.into() }
    }

    /// Create a write rejected error
    pub fn write_rejected(key: impl Into<String>, outcome: WriteOutcome) -> Self {
        Self::WriteRejected {
            key: key.into(),
            outcome,
        }
    }

    /// Create a lock poisoned error
    pub fn lock_poisoned(msg: impl Into<String>) -> Self {
        Self::LockPoisoned(msg.into())
    }
}
