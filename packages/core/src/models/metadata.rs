//! Node metadata
//!
//! Metadata is an open JSON object on the record. Two keys have meaning to the
//! engine:
//!
//! - `isOpened`: whether the hierarchy materializer expands the node
//! - `isInEditMode`: client-only UI state, never overwritten by a fresh read
//!
//! Everything else round-trips through [`NodeMetadata::extra`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const IS_OPENED: &str = "isOpened";
pub const IS_IN_EDIT_MODE: &str = "isInEditMode";

/// Keys owned by the client; a held value survives a refresh
pub const CLIENT_ONLY_KEYS: &[&str] = &[IS_IN_EDIT_MODE];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    #[serde(default)]
    pub is_opened: bool,

    #[serde(default)]
    pub is_in_edit_mode: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeMetadata {
    /// Decode a stored map; `None` yields the defaults
    pub fn from_map(map: Option<&Map<String, Value>>) -> Result<Self, serde_json::Error> {
        match map {
            Some(map) => serde_json::from_value(Value::Object(map.clone())),
            None => Ok(Self::default()),
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert(IS_OPENED.to_string(), Value::Bool(self.is_opened));
        map.insert(IS_IN_EDIT_MODE.to_string(), Value::Bool(self.is_in_edit_mode));
        map
    }
}

/// Shallow metadata update: only present keys are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub is_opened: Option<bool>,
    pub is_in_edit_mode: Option<bool>,
    pub extra: Map<String, Value>,
}

impl MetadataPatch {
    pub fn opened(is_opened: bool) -> Self {
        Self {
            is_opened: Some(is_opened),
            ..Default::default()
        }
    }

    pub fn edit_mode(is_in_edit_mode: bool) -> Self {
        Self {
            is_in_edit_mode: Some(is_in_edit_mode),
            ..Default::default()
        }
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.is_opened.is_none() && self.is_in_edit_mode.is_none() && self.extra.is_empty()
    }

    /// Entries to write, one nested update each
    pub fn into_entries(self) -> Map<String, Value> {
        let mut entries = self.extra;
        if let Some(is_opened) = self.is_opened {
            entries.insert(IS_OPENED.to_string(), Value::Bool(is_opened));
        }
        if let Some(is_in_edit_mode) = self.is_in_edit_mode {
            entries.insert(IS_IN_EDIT_MODE.to_string(), Value::Bool(is_in_edit_mode));
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_map_keeps_unknown_keys() {
        let map = json!({"isOpened": true, "color": "red"});
        let metadata = NodeMetadata::from_map(map.as_object()).unwrap();

        assert!(metadata.is_opened);
        assert!(!metadata.is_in_edit_mode);
        assert_eq!(metadata.extra.get("color"), Some(&json!("red")));
        assert_eq!(
            Value::Object(metadata.to_map()),
            json!({"isOpened": true, "isInEditMode": false, "color": "red"})
        );
    }

    #[test]
    fn test_from_map_rejects_wrong_types() {
        let map = json!({"isOpened": "yes"});
        assert!(NodeMetadata::from_map(map.as_object()).is_err());
    }

    #[test]
    fn test_patch_entries_only_contain_present_keys() {
        let entries = MetadataPatch::opened(true)
            .with_entry("color", json!("blue"))
            .into_entries();
        assert_eq!(Value::Object(entries), json!({"isOpened": true, "color": "blue"}));
        assert!(MetadataPatch::default().is_empty());
    }
}
