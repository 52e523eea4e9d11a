//! Tree arena
//!
//! A materialized tree is a flat id -> node map with explicit child-id lists.
//! Nodes sit behind `Arc`; every update returns a new arena that shares all
//! untouched nodes with the old one and copies only the node it changes.

use crate::db::Record;
use crate::models::IS_OPENED;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: String,
    /// Stored record; `None` for the virtual root
    pub record: Option<Record>,
    /// Record metadata merged with caller-held state
    pub metadata: Map<String, Value>,
    /// Child ids in sibling order
    pub children: Vec<String>,
    /// Whether `children` was loaded
    pub expanded: bool,
}

impl TreeNode {
    pub fn from_record(record: Record, metadata: Map<String, Value>) -> Self {
        Self {
            id: record.key.clone(),
            record: Some(record),
            metadata,
            children: Vec::new(),
            expanded: false,
        }
    }

    /// Always-open container without a stored record
    pub fn virtual_root(id: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert(IS_OPENED.to_string(), Value::Bool(true));
        Self {
            id: id.to_string(),
            record: None,
            metadata,
            children: Vec::new(),
            expanded: false,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.record.is_none()
    }

    pub fn is_opened(&self) -> bool {
        self.is_virtual()
            || self
                .metadata
                .get(IS_OPENED)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    pub fn content(&self) -> &str {
        self.record.as_ref().map(|r| r.content.as_str()).unwrap_or("")
    }
}

/// One visible row of a flattened tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub id: String,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct TreeArena {
    root_id: String,
    nodes: HashMap<String, Arc<TreeNode>>,
}

impl TreeArena {
    pub fn new(root: TreeNode) -> Self {
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), Arc::new(root));
        Self { root_id, nodes }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.get(&self.root_id)
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    /// Shared handle, for identity checks between arena versions
    pub fn node_arc(&self, id: &str) -> Option<&Arc<TreeNode>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Loaded children of `id`, in order
    pub fn children_of(&self, id: &str) -> Vec<&TreeNode> {
        self.get(id)
            .map(|node| node.children.iter().filter_map(|c| self.get(c)).collect())
            .unwrap_or_default()
    }

    /// Merged metadata held for `id`
    pub fn metadata_of(&self, id: &str) -> Option<&Map<String, Value>> {
        self.get(id).map(|node| &node.metadata)
    }

    /// New arena with `entries` merged into the metadata of `id`
    pub fn with_metadata(&self, id: &str, entries: Map<String, Value>) -> Option<Self> {
        self.updated(id, |node| node.metadata.extend(entries))
    }

    /// New arena with `id` flipped between opened and closed
    ///
    /// Loaded children are kept when closing so that reopening shows them
    /// again without a fetch.
    pub fn toggle_opened(&self, id: &str) -> Option<Self> {
        let opened = self.get(id)?.is_opened();
        let mut entries = Map::new();
        entries.insert(IS_OPENED.to_string(), Value::Bool(!opened));
        self.with_metadata(id, entries)
    }

    /// New arena where `children` replace the loaded children of `id`
    ///
    /// Descendants no longer reachable from the root are dropped.
    pub fn with_children(&self, id: &str, children: Vec<TreeNode>) -> Option<Self> {
        let ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        let mut arena = self.updated(id, |node| {
            node.children = ids;
            node.expanded = true;
        })?;
        for child in children {
            arena.nodes.insert(child.id.clone(), Arc::new(child));
        }
        arena.prune();
        Some(arena)
    }

    /// Visible rows in depth-first order, virtual root excluded
    ///
    /// Children of closed nodes are skipped.
    pub fn flatten(&self) -> Vec<FlatEntry> {
        let mut rows = Vec::new();
        let Some(root) = self.root() else {
            return rows;
        };

        let base = if root.is_virtual() {
            0
        } else {
            rows.push(FlatEntry {
                id: root.id.clone(),
                depth: 0,
            });
            1
        };

        let mut stack: Vec<(&str, usize)> = root
            .children
            .iter()
            .rev()
            .map(|c| (c.as_str(), base))
            .collect();
        let mut seen = HashSet::new();

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            if !seen.insert(id) {
                continue;
            }
            rows.push(FlatEntry {
                id: id.to_string(),
                depth,
            });
            if node.is_opened() {
                stack.extend(node.children.iter().rev().map(|c| (c.as_str(), depth + 1)));
            }
        }
        rows
    }

    pub(crate) fn insert_node(&mut self, node: TreeNode) {
        self.nodes.insert(node.id.clone(), Arc::new(node));
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id).map(Arc::make_mut)
    }

    fn updated(&self, id: &str, change: impl FnOnce(&mut TreeNode)) -> Option<Self> {
        let mut arena = self.clone();
        change(arena.node_mut(id)?);
        Some(arena)
    }

    /// Drop nodes not reachable from the root
    fn prune(&mut self) {
        let mut reachable: HashSet<String> = HashSet::new();
        let mut stack = vec![self.root_id.clone()];
        while let Some(id) = stack.pop() {
            if !reachable.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().cloned());
            }
        }
        self.nodes.retain(|id, _| reachable.contains(id));
    }
}
