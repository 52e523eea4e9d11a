//! Hierarchy Layer
//!
//! Materializes nested collections into a [`TreeArena`]: a flat id -> node map
//! with explicit child-id lists and copy-on-write nodes. Expansion follows the
//! `isOpened` metadata flag and merges fresh metadata with what the caller
//! already holds.

mod arena;
mod materializer;
mod merge;

pub use arena::{FlatEntry, TreeArena, TreeNode};
pub use materializer::Materializer;
pub use merge::merge_metadata;
