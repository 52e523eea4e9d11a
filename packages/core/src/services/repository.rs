//! Entity Repository
//!
//! Thin per-kind facade over [`CollectionDriver`]: composes collection keys
//! through the entity's [`EntityCodec`], decodes records into domain structs
//! and translates driver failures into [`ServiceError`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use nodechain_core::db::MemoryStore;
//! use nodechain_core::models::{Node, Scope};
//! use nodechain_core::ordering::CollectionDriver;
//! use nodechain_core::services::NodeRepository;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), nodechain_core::services::ServiceError> {
//! let driver = Arc::new(CollectionDriver::new(Arc::new(MemoryStore::new())));
//! let nodes: NodeRepository<MemoryStore> = NodeRepository::new(driver, Scope::unscoped());
//!
//! let first = nodes.insert(&Node::new("home", "First"), None).await?;
//! nodes.insert(&Node::new("home", "Second"), Some(&first.id)).await?;
//! assert_eq!(nodes.list("home").await?.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::db::{Record, RecordStore};
use crate::models::{EntityCodec, MetadataPatch, NodeCodec, Scope, TaskCodec};
use crate::ordering::CollectionDriver;
use crate::services::ServiceError;
use std::marker::PhantomData;
use std::sync::Arc;

/// List operations for one entity kind
pub struct EntityRepository<S, C>
where
    S: RecordStore + ?Sized,
    C: EntityCodec,
{
    driver: Arc<CollectionDriver<S>>,
    scope: Scope,
    _codec: PhantomData<fn() -> C>,
}

pub type NodeRepository<S> = EntityRepository<S, NodeCodec>;
pub type TaskRepository<S> = EntityRepository<S, TaskCodec>;

impl<S, C> Clone for EntityRepository<S, C>
where
    S: RecordStore + ?Sized,
    C: EntityCodec,
{
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            scope: self.scope.clone(),
            _codec: PhantomData,
        }
    }
}

impl<S, C> EntityRepository<S, C>
where
    S: RecordStore + ?Sized,
    C: EntityCodec,
{
    pub fn new(driver: Arc<CollectionDriver<S>>, scope: Scope) -> Self {
        Self {
            driver,
            scope,
            _codec: PhantomData,
        }
    }

    pub fn driver(&self) -> &Arc<CollectionDriver<S>> {
        &self.driver
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Collection holding the children of `parent_id`
    pub fn collection_key(&self, parent_id: &str) -> String {
        C::collection_key(&self.scope, parent_id)
    }

    /// Children of `parent_id` in sibling order
    pub async fn list(&self, parent_id: &str) -> Result<Vec<C::Entity>, ServiceError> {
        let collection = self.collection_key(parent_id);
        self.driver
            .list(&collection)
            .await?
            .iter()
            .map(|record| decode::<C>(record, parent_id.to_string()))
            .collect()
    }

    /// Fetch one entity
    ///
    /// A record that exists under another kind or scope is reported as
    /// `ModelNotFound`.
    pub async fn get(&self, id: &str) -> Result<C::Entity, ServiceError> {
        let record = self.owned_record(id).await?;
        self.decode(&record)
    }

    /// Store `entity` under its parent, after `after_id` or at the end
    pub async fn insert(
        &self,
        entity: &C::Entity,
        after_id: Option<&str>,
    ) -> Result<C::Entity, ServiceError> {
        let collection = self.collection_key(C::parent_id(entity));
        let record = self
            .driver
            .insert(C::id(entity), &collection, C::encode(entity), after_id)
            .await?;

        tracing::debug!("Inserted {} '{}' into '{}'", C::TYPE_TAG, record.key, collection);
        self.decode(&record)
    }

    /// Apply a partial update; metadata entries are merged key by key
    pub async fn update(&self, id: &str, patch: C::Patch) -> Result<C::Entity, ServiceError> {
        self.owned_record(id).await?;

        let (body, entries) = C::split_patch(patch);
        let mut record = self.driver.update(id, body).await?;
        if let Some(entries) = entries {
            record = self.driver.metadata(id, entries).await?;
        }
        self.decode(&record)
    }

    /// Merge metadata keys without touching content or position
    pub async fn patch_metadata(
        &self,
        id: &str,
        patch: MetadataPatch,
    ) -> Result<C::Entity, ServiceError> {
        let record = self.owned_record(id).await?;
        if patch.is_empty() {
            return self.decode(&record);
        }

        let record = self.driver.metadata(id, patch.into_entries()).await?;
        self.decode(&record)
    }

    /// Remove an entity; removing an absent one succeeds
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let Some(record) = self.driver.get(id).await? else {
            return Ok(());
        };
        if C::parent_of(&self.scope, &record.collection).is_none() {
            return Err(ServiceError::model_not_found(id));
        }

        self.driver.delete(id).await?;
        tracing::debug!("Deleted {} '{}'", C::TYPE_TAG, id);
        Ok(())
    }

    /// Reorder `id` among the children of `parent_id`
    pub async fn move_after(
        &self,
        id: &str,
        parent_id: &str,
        after_id: Option<&str>,
    ) -> Result<(), ServiceError> {
        let collection = self.collection_key(parent_id);
        self.driver.move_after(id, &collection, after_id).await?;
        Ok(())
    }

    async fn owned_record(&self, id: &str) -> Result<Record, ServiceError> {
        let record = self
            .driver
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::model_not_found(id))?;

        if C::parent_of(&self.scope, &record.collection).is_none() {
            return Err(ServiceError::model_not_found(id));
        }
        Ok(record)
    }

    fn decode(&self, record: &Record) -> Result<C::Entity, ServiceError> {
        let parent_id = C::parent_of(&self.scope, &record.collection)
            .ok_or_else(|| ServiceError::model_not_found(&record.key))?;
        decode::<C>(record, parent_id)
    }
}

fn decode<C: EntityCodec>(record: &Record, parent_id: String) -> Result<C::Entity, ServiceError> {
    C::decode(record, parent_id).map_err(|e| {
        ServiceError::corrupted(format!("record '{}' cannot be decoded: {}", record.key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, RecordBody, TAIL};
    use crate::models::{Node, NodePatch, Task, TaskPatch};

    fn repos() -> (NodeRepository<MemoryStore>, TaskRepository<MemoryStore>) {
        let driver = Arc::new(CollectionDriver::new(Arc::new(MemoryStore::new())));
        (
            NodeRepository::new(driver.clone(), Scope::unscoped()),
            TaskRepository::new(driver, Scope::unscoped()),
        )
    }

    #[tokio::test]
    async fn test_kinds_do_not_see_each_other() {
        let (nodes, tasks) = repos();
        let node = nodes.insert(&Node::with_id("n1", "home", "Note"), None).await.unwrap();
        let task = tasks.insert(&Task::new("home", "Chore"), None).await.unwrap();

        assert_eq!(nodes.list("home").await.unwrap(), vec![node.clone()]);
        assert_eq!(tasks.list("home").await.unwrap(), vec![task.clone()]);

        assert!(matches!(
            tasks.get(&node.id).await,
            Err(ServiceError::ModelNotFound { .. })
        ));
        assert!(matches!(
            nodes.delete(&task.id).await,
            Err(ServiceError::ModelNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_patch() {
        let (_, tasks) = repos();
        let task = tasks.insert(&Task::new("home", "Chore"), None).await.unwrap();

        let done = tasks
            .update(
                &task.id,
                TaskPatch {
                    done: Some(true),
                    metadata: Some(MetadataPatch::edit_mode(true)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(done.done);
        assert_eq!(done.content, "Chore");
        assert!(done.metadata.is_in_edit_mode);
    }

    #[tokio::test]
    async fn test_patch_metadata_on_record_without_map() {
        let (nodes, _) = repos();
        // Written outside the codec, so no metadata map exists yet
        let raw = Record::member("raw", "node:home", TAIL, RecordBody::text("Raw"));
        nodes.driver().store().put(raw, None).await.unwrap();
        nodes
            .driver()
            .store()
            .put(Record::head_pointing_at("node:home", "raw"), None)
            .await
            .unwrap();

        let node = nodes
            .patch_metadata("raw", MetadataPatch::opened(true))
            .await
            .unwrap();
        assert!(node.metadata.is_opened);
        assert_eq!(node.content, "Raw");
    }

    #[tokio::test]
    async fn test_missing_and_invalid() {
        let (nodes, _) = repos();
        assert!(matches!(
            nodes.get("ghost").await,
            Err(ServiceError::ModelNotFound { .. })
        ));
        assert!(matches!(
            nodes.update("ghost", NodePatch::default()).await,
            Err(ServiceError::ModelNotFound { .. })
        ));
        nodes.delete("ghost").await.unwrap();

        let err = nodes
            .insert(&Node::with_id("#bad", "home", "x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid { .. }));
    }
}
