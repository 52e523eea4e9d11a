//! Hierarchy Materializer
//!
//! Builds a [`TreeArena`] below a node by listing child collections level by
//! level. Only opened containers are expanded; the requested node itself is
//! always expanded when recursing. All list calls of one level are issued
//! concurrently.

use crate::config::HierarchyConfig;
use crate::db::RecordStore;
use crate::hierarchy::merge::merge_metadata;
use crate::hierarchy::{TreeArena, TreeNode};
use crate::models::{EntityCodec, Scope};
use crate::ordering::{CollectionDriver, OrderingError};
use futures::future::join_all;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct Materializer<S, C>
where
    S: RecordStore + ?Sized,
    C: EntityCodec,
{
    driver: Arc<CollectionDriver<S>>,
    scope: Scope,
    config: HierarchyConfig,
    _codec: PhantomData<fn() -> C>,
}

impl<S, C> Materializer<S, C>
where
    S: RecordStore + ?Sized,
    C: EntityCodec,
{
    /// Materializer scoped by `config.owner_scope`
    pub fn new(driver: Arc<CollectionDriver<S>>, config: HierarchyConfig) -> Self {
        let scope = Scope {
            owner: config.owner_scope.clone(),
        };
        Self {
            driver,
            scope,
            config,
            _codec: PhantomData,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.config.root_id
    }

    /// Tree below `id`
    ///
    /// `held` is the arena the caller currently displays; its metadata is
    /// merged into every fetched node so client-only state survives.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` is neither the virtual root nor a stored record
    ///   listed under this codec and scope
    /// - Any driver error raised while listing a level
    pub async fn materialize(
        &self,
        id: &str,
        recursive: bool,
        held: Option<&TreeArena>,
    ) -> Result<TreeArena, OrderingError> {
        let root = if id == self.config.root_id {
            TreeNode::virtual_root(id)
        } else {
            let record = self
                .driver
                .get(id)
                .await?
                .filter(|record| C::parent_of(&self.scope, &record.collection).is_some())
                .ok_or_else(|| OrderingError::not_found(id))?;
            let metadata = merge_metadata(
                record.metadata.as_ref(),
                held.and_then(|arena| arena.metadata_of(id)),
            );
            TreeNode::from_record(record, metadata)
        };

        let mut arena = TreeArena::new(root);
        if !recursive {
            return Ok(arena);
        }

        let mut frontier = vec![id.to_string()];
        let mut depth = 0;

        while !frontier.is_empty() {
            if depth >= self.config.max_depth {
                tracing::debug!(
                    "Stopping expansion below '{}' at depth {} ({} container(s) left closed)",
                    id,
                    depth,
                    frontier.len()
                );
                break;
            }

            let listings = join_all(frontier.iter().map(|parent_id| {
                let collection = C::collection_key(&self.scope, parent_id);
                async move { self.driver.list(&collection).await }
            }))
            .await;

            let mut next = Vec::new();
            for (parent_id, listing) in frontier.iter().zip(listings) {
                let mut children = Vec::new();
                for record in listing? {
                    if arena.contains(&record.key) {
                        tracing::warn!(
                            "Node '{}' listed under '{}' was already materialized; skipping",
                            record.key,
                            parent_id
                        );
                        continue;
                    }
                    let metadata = merge_metadata(
                        record.metadata.as_ref(),
                        held.and_then(|arena| arena.metadata_of(&record.key)),
                    );
                    let node = TreeNode::from_record(record, metadata);
                    if node.is_opened() {
                        next.push(node.id.clone());
                    }
                    children.push(node.id.clone());
                    arena.insert_node(node);
                }

                if let Some(parent) = arena.node_mut(parent_id) {
                    parent.children = children;
                    parent.expanded = true;
                }
            }

            frontier = next;
            depth += 1;
        }

        tracing::debug!("Materialized {} node(s) below '{}'", arena.len(), id);
        Ok(arena)
    }
}
