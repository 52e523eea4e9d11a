//! Business Services
//!
//! - [`EntityRepository`] - per-entity-kind list operations on top of the
//!   collection driver
//! - [`ServiceError`] - domain errors translated from driver failures

mod error;
mod repository;

pub use error::ServiceError;
pub use repository::{EntityRepository, NodeRepository, TaskRepository};
