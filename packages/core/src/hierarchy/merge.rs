//! Metadata merge between a fresh read and caller-held state

use crate::models::CLIENT_ONLY_KEYS;
use serde_json::{Map, Value};

/// Merge fresh metadata with the metadata the caller already holds
///
/// Fresh keys win, except client-only keys, which keep the held value. Keys
/// the fresh map lacks keep the held value as well.
pub fn merge_metadata(
    fresh: Option<&Map<String, Value>>,
    held: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = fresh.cloned().unwrap_or_default();
    let Some(held) = held else {
        return merged;
    };

    for (name, value) in held {
        if CLIENT_ONLY_KEYS.contains(&name.as_str()) || !merged.contains_key(name) {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}
