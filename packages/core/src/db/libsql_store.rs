//! libsql-backed record store
//!
//! Persists records in a single `records` table of an embedded libsql
//! (SQLite-compatible) database. The two secondary index views the ordering
//! driver needs are ordinary SQL indexes:
//!
//! - `idx_records_collection` on `(collection)` for `by_collection`
//! - `idx_records_collection_successor` on `(collection, successor)` for
//!   `by_collection_and_successor`
//!
//! # Conditional writes
//!
//! Every conditional write is ONE statement whose `WHERE` clause carries the
//! condition; SQLite applies a single statement atomically, so the predicate is
//! evaluated against the stored row immediately before the write. Rows-affected
//! decides the outcome. When nothing was written, a follow-up existence probe
//! distinguishes `Missing` from `ConditionFailed` (diagnostic only).
//!
//! # Connections
//!
//! Like the rest of the codebase, every call opens a connection with a busy
//! timeout so concurrent writers wait instead of failing with `SQLITE_BUSY`.
//! Because each call opens its own connection, the store needs a file-backed
//! database; `:memory:` would give every connection a private database.

use crate::db::{Condition, DatabaseError, Record, RecordChanges, RecordStore, WriteOutcome};
use async_trait::async_trait;
use libsql::{params::Params, Builder, Connection, Database, Value as SqlValue};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

const RECORD_COLUMNS: &str = "record_key, collection, successor, content, kind, metadata";

/// Record store persisted in an embedded libsql database
#[derive(Clone)]
pub struct LibsqlStore {
    /// libsql database handle (wrapped in Arc for sharing)
    db: Arc<Database>,

    /// Path to the database file
    db_path: PathBuf,

    /// Busy timeout applied to every connection
    busy_timeout_ms: u64,
}

impl std::fmt::Debug for LibsqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibsqlStore")
            .field("db_path", &self.db_path)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl LibsqlStore {
    /// Open (or create) the database at `db_path` and initialize the schema
    ///
    /// Uses the default 5 second busy timeout.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_busy_timeout(db_path, crate::config::DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Open the database with an explicit busy timeout
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn with_busy_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u64,
    ) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let store = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };
        store.initialize_schema().await?;

        tracing::debug!("Opened record store at {}", store.db_path.display());
        Ok(store)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so they go through query() instead of execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let _ = conn.query(pragma, ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Get a connection with the busy timeout configured
    async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self.db.connect().map_err(DatabaseError::LibsqlError)?;
        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;
        Ok(conn)
    }

    /// Create the records table and both index views (idempotent)
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                record_key TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                successor TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                kind TEXT,
                metadata JSON
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create records table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_records_collection': {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_collection_successor
             ON records(collection, successor)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_records_collection_successor': {}",
                e
            ))
        })?;

        Ok(())
    }

    /// Whether a row exists for `key`
    async fn exists(&self, conn: &Connection, key: &str) -> Result<bool, DatabaseError> {
        let mut rows = conn
            .query("SELECT 1 FROM records WHERE record_key = ?", [key])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to probe '{}': {}", key, e)))?;
        Ok(rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .is_some())
    }

    /// Outcome of a conditional statement that affected `rows` rows
    async fn settle(
        &self,
        conn: &Connection,
        key: &str,
        rows: u64,
    ) -> Result<WriteOutcome, DatabaseError> {
        if rows > 0 {
            Ok(WriteOutcome::Applied)
        } else if self.exists(conn, key).await? {
            Ok(WriteOutcome::ConditionFailed)
        } else {
            Ok(WriteOutcome::Missing)
        }
    }

    async fn query_records(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Vec<Record>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(sql, Params::Positional(params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query records: {}", e)))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }
}

/// SQL fragment (appended to a WHERE clause) and parameter for a condition
///
/// `NotExists` cannot hold for a row an UPDATE/DELETE matches, so it becomes
/// an always-false clause.
fn condition_clause(condition: &Condition) -> (&'static str, Option<SqlValue>) {
    match condition {
        Condition::NotExists => (" AND 0", None),
        Condition::SuccessorEquals(value) => (" AND successor = ?", Some(value.clone().into())),
        Condition::SuccessorNotEquals(value) => {
            (" AND successor <> ?", Some(value.clone().into()))
        }
    }
}

fn metadata_to_sql(metadata: &Option<Map<String, Value>>) -> Result<SqlValue, DatabaseError> {
    match metadata {
        Some(map) => Ok(SqlValue::Text(serde_json::to_string(map)?)),
        None => Ok(SqlValue::Null),
    }
}

fn record_from_row(row: &libsql::Row) -> Result<Record, DatabaseError> {
    let column = |e: libsql::Error| DatabaseError::sql_execution(format!("Bad record row: {}", e));

    let metadata: Option<String> = row.get(5).map_err(column)?;
    let metadata = match metadata {
        Some(text) => match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(DatabaseError::sql_execution(format!(
                    "metadata must be a JSON object, found {}",
                    other
                )))
            }
        },
        None => None,
    };

    Ok(Record {
        key: row.get(0).map_err(column)?,
        collection: row.get(1).map_err(column)?,
        successor: row.get(2).map_err(column)?,
        content: row.get(3).map_err(column)?,
        kind: row.get(4).map_err(column)?,
        metadata,
    })
}

/// JSON path addressing one top-level metadata key
fn metadata_path(name: &str) -> String {
    format!("$.\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl RecordStore for LibsqlStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, DatabaseError> {
        let mut records = self
            .query_records(
                &format!("SELECT {} FROM records WHERE record_key = ?", RECORD_COLUMNS),
                vec![key.into()],
            )
            .await?;
        Ok(records.pop())
    }

    async fn put(
        &self,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError> {
        let conn = self.connect().await?;
        let metadata = metadata_to_sql(&record.metadata)?;
        let kind: SqlValue = record.kind.clone().into();

        let mut params: Vec<SqlValue> = vec![
            record.key.clone().into(),
            record.collection.clone().into(),
            record.successor.clone().into(),
            record.content.clone().into(),
            kind,
            metadata,
        ];

        let sql = match &condition {
            None => format!(
                "INSERT INTO records ({}) VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(record_key) DO UPDATE SET
                    collection = excluded.collection,
                    successor = excluded.successor,
                    content = excluded.content,
                    kind = excluded.kind,
                    metadata = excluded.metadata",
                RECORD_COLUMNS
            ),
            Some(Condition::NotExists) => format!(
                "INSERT INTO records ({}) VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(record_key) DO NOTHING",
                RECORD_COLUMNS
            ),
            Some(other) => {
                // Successor conditions require an existing row: replace it in place
                let (clause, value) = condition_clause(other);
                let key = params.remove(0);
                params.push(key);
                params.extend(value);
                format!(
                    "UPDATE records SET collection = ?, successor = ?, content = ?, kind = ?, metadata = ?
                     WHERE record_key = ?{}",
                    clause
                )
            }
        };

        let rows = conn
            .execute(&sql, Params::Positional(params))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to put record '{}': {}", record.key, e))
            })?;

        match condition {
            None => Ok(WriteOutcome::Applied),
            Some(Condition::NotExists) if rows == 0 => Ok(WriteOutcome::ConditionFailed),
            Some(Condition::NotExists) => Ok(WriteOutcome::Applied),
            Some(_) => self.settle(&conn, &record.key, rows).await,
        }
    }

    async fn update(
        &self,
        key: &str,
        changes: RecordChanges,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError> {
        let conn = self.connect().await?;

        if changes.is_empty() {
            return Ok(if self.exists(&conn, key).await? {
                WriteOutcome::Applied
            } else {
                WriteOutcome::Missing
            });
        }

        let mut assignments = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        if let Some(successor) = changes.successor {
            assignments.push("successor = ?");
            params.push(successor.into());
        }
        if let Some(content) = changes.content {
            assignments.push("content = ?");
            params.push(content.into());
        }
        if let Some(kind) = changes.kind {
            assignments.push("kind = ?");
            params.push(kind.into());
        }
        if let Some(metadata) = changes.metadata {
            assignments.push("metadata = ?");
            params.push(metadata_to_sql(&Some(metadata))?);
        }
        params.push(key.into());

        let mut sql = format!(
            "UPDATE records SET {} WHERE record_key = ?",
            assignments.join(", ")
        );
        if let Some(condition) = &condition {
            let (clause, value) = condition_clause(condition);
            sql.push_str(clause);
            params.extend(value);
        }

        let rows = conn
            .execute(&sql, Params::Positional(params))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to update record '{}': {}", key, e))
            })?;

        self.settle(&conn, key, rows).await
    }

    async fn delete(
        &self,
        key: &str,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome, DatabaseError> {
        let conn = self.connect().await?;

        let mut sql = String::from("DELETE FROM records WHERE record_key = ?");
        let mut params: Vec<SqlValue> = vec![key.into()];
        if let Some(condition) = &condition {
            let (clause, value) = condition_clause(condition);
            sql.push_str(clause);
            params.extend(value);
        }

        let rows = conn
            .execute(&sql, Params::Positional(params))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to delete record '{}': {}", key, e))
            })?;

        match condition {
            None => Ok(WriteOutcome::Applied),
            Some(_) => self.settle(&conn, key, rows).await,
        }
    }

    async fn set_metadata_entry(
        &self,
        key: &str,
        name: &str,
        value: Value,
    ) -> Result<WriteOutcome, DatabaseError> {
        let conn = self.connect().await?;
        let encoded = serde_json::to_string(&value)?;

        let rows = conn
            .execute(
                "UPDATE records SET metadata = json_set(metadata, ?, json(?))
                 WHERE record_key = ? AND metadata IS NOT NULL",
                (metadata_path(name), encoded, key.to_string()),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to set metadata '{}' on '{}': {}",
                    name, key, e
                ))
            })?;

        if rows > 0 {
            Ok(WriteOutcome::Applied)
        } else if self.exists(&conn, key).await? {
            Err(DatabaseError::metadata_missing(key))
        } else {
            Ok(WriteOutcome::Missing)
        }
    }

    async fn by_collection(&self, collection: &str) -> Result<Vec<Record>, DatabaseError> {
        self.query_records(
            &format!("SELECT {} FROM records WHERE collection = ?", RECORD_COLUMNS),
            vec![collection.into()],
        )
        .await
    }

    async fn by_collection_and_successor(
        &self,
        collection: &str,
        successor: &str,
    ) -> Result<Option<Record>, DatabaseError> {
        let mut records = self
            .query_records(
                &format!(
                    "SELECT {} FROM records WHERE collection = ? AND successor = ? LIMIT 2",
                    RECORD_COLUMNS
                ),
                vec![collection.into(), successor.into()],
            )
            .await?;

        if records.len() > 1 {
            tracing::warn!(
                "Collection '{}' has several records pointing at '{}'",
                collection,
                successor
            );
        }
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }
}
