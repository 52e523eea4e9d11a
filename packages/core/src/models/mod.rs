//! Data Models
//!
//! Entity kinds stored as list members:
//!
//! - [`EntityCodec`] - the seam between an entity kind and stored records
//! - [`Node`] / [`NodeCodec`] - content items that own child collections
//! - [`Task`] / [`TaskCodec`] - tasks with a done flag
//! - [`NodeMetadata`] / [`MetadataPatch`] - typed view of the metadata map

mod codec;
mod metadata;
mod node;
mod task;

pub use codec::{EntityCodec, Scope};
pub use metadata::{MetadataPatch, NodeMetadata, CLIENT_ONLY_KEYS, IS_IN_EDIT_MODE, IS_OPENED};
pub use node::{Node, NodeCodec, NodePatch};
pub use task::{Task, TaskCodec, TaskPatch};
