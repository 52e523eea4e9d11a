//! Ordering Layer
//!
//! Sibling order as a singly-linked list over point records:
//!
//! - [`CollectionDriver`] - insert/delete/move/list over any [`crate::db::RecordStore`]
//! - [`follow`] - pure order reconstruction from an unordered collection read
//! - [`WriteIntent`] - journal of multi-write operations that have not resolved cleanly
//! - [`ChainReport`] - read-only invariant check of one collection

mod driver;
mod error;
mod follow;
mod intent;
mod verify;

pub use driver::{BodyPatch, CollectionDriver};
pub use error::{Operation, OrderingError};
pub use follow::{follow, ChainAnomaly, Followed};
pub use intent::{pending as pending_intents, WriteIntent, INTENT_COLLECTION};
pub use verify::ChainReport;
