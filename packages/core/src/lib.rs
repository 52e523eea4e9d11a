//! NodeChain Core
//!
//! Ordered hierarchical records on top of a point-access key-value store.
//!
//! Every node owns an ordered collection of children. Sibling order is a
//! singly-linked list spread over individual records: each record carries a
//! `successor` pointer and a synthetic head record marks the entry point of
//! each collection. Insert, delete and move touch only the two or three
//! records adjacent to the change, guarded by per-record conditional writes.
//!
//! # Modules
//!
//! - [`db`] - Record model, the `RecordStore` trait and its backends (memory, libsql)
//! - [`ordering`] - The collection driver (insert/delete/move/list), write-intent journal, chain verifier
//! - [`hierarchy`] - Tree materialization into a copy-on-write arena
//! - [`models`] - Entity codecs (`Node`, `Task`) and typed patches
//! - [`services`] - Per-entity repositories translating driver errors to domain errors
//! - [`config`] - Engine configuration

pub mod config;
pub mod db;
pub mod hierarchy;
pub mod models;
pub mod ordering;
pub mod services;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig, HierarchyConfig, OrderingConfig, StoreConfig};
pub use db::{
    Condition, DatabaseError, LibsqlStore, MemoryStore, Record, RecordBody, RecordChanges,
    RecordStore, WriteOutcome,
};
pub use hierarchy::{Materializer, TreeArena, TreeNode};
pub use models::{
    EntityCodec, MetadataPatch, Node, NodeCodec, NodeMetadata, NodePatch, Scope, Task, TaskCodec,
    TaskPatch,
};
pub use ordering::{BodyPatch, ChainReport, CollectionDriver, OrderingError, WriteIntent};
pub use services::{EntityRepository, NodeRepository, ServiceError, TaskRepository};
