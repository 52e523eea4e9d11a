//! Entity codec seam
//!
//! An [`EntityCodec`] is everything an entity kind contributes to the engine:
//! a type tag, the way its collection keys are composed, and the translation
//! between its domain struct and a stored [`Record`]. The list algorithms never
//! see entity types.

use crate::db::{Record, RecordBody};
use crate::ordering::BodyPatch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator between the parts of a collection key
const SEPARATOR: char = ':';

/// Optional owner prefix of collection keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub owner: Option<String>,
}

impl Scope {
    /// Collections shared by everyone
    pub fn unscoped() -> Self {
        Self::default()
    }

    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
        }
    }

    /// `"{owner}:{tag}:{parent}"`, or `"{tag}:{parent}"` when unscoped
    pub fn collection_key(&self, tag: &str, parent_id: &str) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}{SEPARATOR}{tag}{SEPARATOR}{parent_id}"),
            None => format!("{tag}{SEPARATOR}{parent_id}"),
        }
    }

    /// Parent id encoded in `collection`, if it belongs to this scope and tag
    pub fn parent_of(&self, tag: &str, collection: &str) -> Option<String> {
        let prefix = self.collection_key(tag, "");
        collection
            .strip_prefix(&prefix)
            .filter(|parent| !parent.is_empty())
            .map(str::to_string)
    }
}

/// Translation between one entity kind and stored records
pub trait EntityCodec: Send + Sync + 'static {
    /// Domain type handed to callers
    type Entity: Clone + std::fmt::Debug + Send + Sync;

    /// Partial update accepted by the repository
    type Patch: Send;

    /// Type tag embedded in collection keys
    const TYPE_TAG: &'static str;

    fn collection_key(scope: &Scope, parent_id: &str) -> String {
        scope.collection_key(Self::TYPE_TAG, parent_id)
    }

    fn parent_of(scope: &Scope, collection: &str) -> Option<String> {
        scope.parent_of(Self::TYPE_TAG, collection)
    }

    /// Record key of the entity
    fn id(entity: &Self::Entity) -> &str;

    /// Parent the entity is listed under
    fn parent_id(entity: &Self::Entity) -> &str;

    /// Rebuild the entity from a stored record
    fn decode(record: &Record, parent_id: String) -> Result<Self::Entity, serde_json::Error>;

    /// Persisted fields of the entity
    fn encode(entity: &Self::Entity) -> RecordBody;

    /// Split a patch into in-place body changes and metadata entries
    fn split_patch(patch: Self::Patch) -> (BodyPatch, Option<Map<String, Value>>);
}
