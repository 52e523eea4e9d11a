//! Node Data Structures
//!
//! A `Node` is a content item that owns an ordered collection of child nodes.
//! Its siblings live in the collection `node:{parent_id}` (prefixed with the
//! owner when scoped).
//!
//! # Examples
//!
//! ```rust
//! use nodechain_core::models::{EntityCodec, Node, NodeCodec, Scope};
//!
//! let node = Node::new("home", "My first note");
//! assert_eq!(node.parent_id, "home");
//! assert_eq!(NodeCodec::collection_key(&Scope::unscoped(), "home"), "node:home");
//! ```

use crate::db::{Record, RecordBody};
use crate::models::{EntityCodec, MetadataPatch, NodeMetadata};
use crate::ordering::BodyPatch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub parent_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: NodeMetadata,
}

impl Node {
    /// New node with a generated UUID
    pub fn new(parent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), parent_id, content)
    }

    pub fn with_id(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            content: content.into(),
            kind: None,
            metadata: NodeMetadata::default(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn opened(mut self) -> Self {
        self.metadata.is_opened = true;
        self
    }
}

/// Partial node update
///
/// Only present fields are rewritten. `kind` uses the double-Option pattern:
/// - `None`: don't change kind
/// - `Some(None)`: clear kind
/// - `Some(Some(k))`: set kind to `k`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub content: Option<String>,
    pub kind: Option<Option<String>>,
    pub metadata: Option<MetadataPatch>,
}

/// Codec for [`Node`] (tag `node`)
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeCodec;

impl EntityCodec for NodeCodec {
    type Entity = Node;
    type Patch = NodePatch;

    const TYPE_TAG: &'static str = "node";

    fn id(entity: &Node) -> &str {
        &entity.id
    }

    fn parent_id(entity: &Node) -> &str {
        &entity.parent_id
    }

    fn decode(record: &Record, parent_id: String) -> Result<Node, serde_json::Error> {
        Ok(Node {
            id: record.key.clone(),
            parent_id,
            content: record.content.clone(),
            kind: record.kind.clone(),
            metadata: NodeMetadata::from_map(record.metadata.as_ref())?,
        })
    }

    fn encode(node: &Node) -> RecordBody {
        RecordBody {
            content: node.content.clone(),
            kind: node.kind.clone(),
            metadata: Some(node.metadata.to_map()),
        }
    }

    fn split_patch(patch: NodePatch) -> (BodyPatch, Option<Map<String, Value>>) {
        let body = BodyPatch {
            content: patch.content,
            kind: patch.kind,
        };
        let entries = patch
            .metadata
            .filter(|m| !m.is_empty())
            .map(MetadataPatch::into_entries);
        (body, entries)
    }
}
