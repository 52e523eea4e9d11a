//! Task entity
//!
//! Tasks live in their own `task:{parent_id}` collections. Completion is stored
//! in the record's `kind` (`"done"` / `"todo"`).

use crate::db::{Record, RecordBody};
use crate::models::{EntityCodec, MetadataPatch, NodeMetadata};
use crate::ordering::BodyPatch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

const KIND_DONE: &str = "done";
const KIND_TODO: &str = "todo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub parent_id: String,
    pub content: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: NodeMetadata,
}

impl Task {
    pub fn new(parent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: parent_id.into(),
            content: content.into(),
            done: false,
            metadata: NodeMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub done: Option<bool>,
    pub metadata: Option<MetadataPatch>,
}

fn done_kind(done: bool) -> String {
    if done { KIND_DONE } else { KIND_TODO }.to_string()
}

/// Codec for [`Task`] (tag `task`)
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCodec;

impl EntityCodec for TaskCodec {
    type Entity = Task;
    type Patch = TaskPatch;

    const TYPE_TAG: &'static str = "task";

    fn id(entity: &Task) -> &str {
        &entity.id
    }

    fn parent_id(entity: &Task) -> &str {
        &entity.parent_id
    }

    fn decode(record: &Record, parent_id: String) -> Result<Task, serde_json::Error> {
        Ok(Task {
            id: record.key.clone(),
            parent_id,
            content: record.content.clone(),
            done: record.kind.as_deref() == Some(KIND_DONE),
            metadata: NodeMetadata::from_map(record.metadata.as_ref())?,
        })
    }

    fn encode(task: &Task) -> RecordBody {
        RecordBody {
            content: task.content.clone(),
            kind: Some(done_kind(task.done)),
            metadata: Some(task.metadata.to_map()),
        }
    }

    fn split_patch(patch: TaskPatch) -> (BodyPatch, Option<Map<String, Value>>) {
        let body = BodyPatch {
            content: patch.content,
            kind: patch.done.map(|done| Some(done_kind(done))),
        };
        let entries = patch
            .metadata
            .filter(|m| !m.is_empty())
            .map(MetadataPatch::into_entries);
        (body, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TAIL;

    #[test]
    fn test_done_flag_lives_in_kind() {
        let mut task = Task::new("p1", "Write tests");
        task.done = true;

        let body = TaskCodec::encode(&task);
        assert_eq!(body.kind.as_deref(), Some("done"));

        let record = Record::member(&task.id, "task:p1", TAIL, body);
        assert!(TaskCodec::decode(&record, "p1".into()).unwrap().done);
    }

    #[test]
    fn test_unknown_kind_decodes_as_open_task() {
        let record =
            Record::member("t1", "task:p1", TAIL, RecordBody::text("x").with_kind("weird"));
        assert!(!TaskCodec::decode(&record, "p1".into()).unwrap().done);
    }

    #[test]
    fn test_patch_done_maps_to_kind() {
        let (body, entries) = TaskCodec::split_patch(TaskPatch {
            done: Some(false),
            ..Default::default()
        });
        assert_eq!(body.kind, Some(Some("todo".to_string())));
        assert!(body.content.is_none());
        assert!(entries.is_none());
    }
}
