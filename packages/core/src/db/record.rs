//! Record Data Structures
//!
//! A [`Record`] is the only physical storage unit. Sibling order is encoded in
//! the `successor` field: each record points at the key of the next sibling,
//! and the last sibling points at the [`TAIL`] sentinel. Every collection has a
//! synthetic head record (key `"#" + collection`) whose successor is the first
//! real member.
//!
//! # Examples
//!
//! ```rust
//! use nodechain_core::db::{head_key, Record, RecordBody, TAIL};
//!
//! let head = Record::head("node:home");
//! assert_eq!(head.key, head_key("node:home"));
//! assert_eq!(head.successor, TAIL);
//!
//! let item = Record::member("a", "node:home", TAIL, RecordBody::text("First"));
//! assert!(item.is_tail());
//! assert!(!item.is_head());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Successor value of the last record in a collection
pub const TAIL: &str = ".";

/// Prefix of head record keys (`"#" + collection`)
pub const HEAD_PREFIX: char = '#';

/// Prefix of write-intent journal keys
pub const JOURNAL_PREFIX: char = '!';

/// Key of the head record for `collection`
pub fn head_key(collection: &str) -> String {
    format!("{}{}", HEAD_PREFIX, collection)
}

/// Whether `key` is reserved for engine-internal records
///
/// Member keys may not be empty, may not be the tail sentinel, and may not
/// start with the head or journal prefix.
pub fn is_reserved_key(key: &str) -> bool {
    key.is_empty() || key == TAIL || key.starts_with(HEAD_PREFIX) || key.starts_with(JOURNAL_PREFIX)
}

/// A single stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Primary key, globally unique
    pub key: String,

    /// Sibling-group id (owner scope + type tag + parent id)
    pub collection: String,

    /// Key of the next sibling, or [`TAIL`]
    pub successor: String,

    /// Primary content
    #[serde(default)]
    pub content: String,

    /// Optional interpreter/type tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Open-ended metadata (`isOpened`, `isInEditMode`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Record {
    /// Head record of an empty collection
    pub fn head(collection: &str) -> Self {
        Self::head_pointing_at(collection, TAIL)
    }

    /// Head record whose successor is `first`
    pub fn head_pointing_at(collection: &str, first: &str) -> Self {
        Self {
            key: head_key(collection),
            collection: collection.to_string(),
            successor: first.to_string(),
            content: String::new(),
            kind: None,
            metadata: None,
        }
    }

    /// Member record carrying `body`
    pub fn member(key: &str, collection: &str, successor: &str, body: RecordBody) -> Self {
        Self {
            key: key.to_string(),
            collection: collection.to_string(),
            successor: successor.to_string(),
            content: body.content,
            kind: body.kind,
            metadata: body.metadata,
        }
    }

    /// Whether this is the head record of its collection
    pub fn is_head(&self) -> bool {
        self.key.starts_with(HEAD_PREFIX) && self.key[HEAD_PREFIX.len_utf8()..] == self.collection
    }

    /// Whether this record is the last in its chain
    pub fn is_tail(&self) -> bool {
        self.successor == TAIL
    }

    /// The stored body (content, kind, metadata)
    pub fn body(&self) -> RecordBody {
        RecordBody {
            content: self.content.clone(),
            kind: self.kind.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Boolean metadata flag, `false` when absent or not a boolean
    pub fn metadata_flag(&self, name: &str) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(name))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// The caller-owned part of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBody {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl RecordBody {
    /// Body with content only
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Sparse point update of a stored record
///
/// Only the fields that are `Some` are written. `kind` uses the double-Option
/// pattern:
/// - `None`: don't change kind
/// - `Some(None)`: clear kind
/// - `Some(Some(k))`: set kind to `k`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordChanges {
    pub successor: Option<String>,
    pub content: Option<String>,
    pub kind: Option<Option<String>>,
    pub metadata: Option<Map<String, Value>>,
}

impl RecordChanges {
    /// Change only the successor pointer
    pub fn successor(successor: impl Into<String>) -> Self {
        Self {
            successor: Some(successor.into()),
            ..Default::default()
        }
    }

    /// Replace the whole metadata map
    pub fn metadata(metadata: Map<String, Value>) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.successor.is_none()
            && self.content.is_none()
            && self.kind.is_none()
            && self.metadata.is_none()
    }

    /// Apply to an in-memory record
    pub fn apply_to(&self, record: &mut Record) {
        if let Some(successor) = &self.successor {
            record.successor = successor.clone();
        }
        if let Some(content) = &self.content {
            record.content = content.clone();
        }
        if let Some(kind) = &self.kind {
            record.kind = kind.clone();
        }
        if let Some(metadata) = &self.metadata {
            record.metadata = Some(metadata.clone());
        }
    }
}

/// Predicate evaluated atomically against the stored record before a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No record with this key exists
    NotExists,
    /// The record exists and its successor equals the value
    SuccessorEquals(String),
    /// The record exists and its successor differs from the value
    SuccessorNotEquals(String),
}

impl Condition {
    /// Evaluate against the currently stored record
    pub fn holds(&self, current: Option<&Record>) -> bool {
        match self {
            Condition::NotExists => current.is_none(),
            Condition::SuccessorEquals(expected) => {
                current.is_some_and(|r| r.successor == *expected)
            }
            Condition::SuccessorNotEquals(value) => current.is_some_and(|r| r.successor != *value),
        }
    }
}

/// Result of a single point write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied
    Applied,
    /// The condition did not hold; nothing was written
    ConditionFailed,
    /// The targeted record does not exist; nothing was written
    Missing,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}
