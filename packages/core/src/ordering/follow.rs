//! Order reconstruction
//!
//! Rebuilds sibling order from an unordered `by_collection` result by walking
//! successor pointers from the head through a key → record map. The head is
//! identified by its key (`"#" + collection`), never by its position in the
//! result set.

use crate::db::{head_key, Record, TAIL};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Where and why traversal stopped before reaching the tail sentinel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ChainAnomaly {
    /// `from` points back at an already visited record
    Cycle { from: String, to: String },
    /// `from` points at a key that is not a member of the collection
    Dangling { from: String, missing: String },
}

/// Result of walking a collection's chain
#[derive(Debug, Clone, Default)]
pub struct Followed {
    /// Whether the head record was among the input
    pub head_present: bool,
    /// Members in chain order (head excluded)
    pub ordered: Vec<Record>,
    /// Members the walk never reached, sorted by key
    pub unreachable: Vec<Record>,
    /// Why the walk stopped early, if it did
    pub anomaly: Option<ChainAnomaly>,
}

/// Walk the chain of `collection` through `records`
///
/// Always terminates: each member is visited at most once, so a corrupted
/// chain yields the reachable prefix plus an anomaly instead of looping.
pub fn follow(collection: &str, records: Vec<Record>) -> Followed {
    let head_key = head_key(collection);
    let mut head = None;
    let mut members: HashMap<String, Record> = HashMap::with_capacity(records.len());

    for record in records {
        if record.key == head_key {
            head = Some(record);
        } else if record.collection == collection {
            members.insert(record.key.clone(), record);
        }
    }

    let Some(head) = head else {
        return Followed {
            head_present: false,
            ordered: Vec::new(),
            unreachable: sorted(members.into_values().collect()),
            anomaly: None,
        };
    };

    let mut ordered = Vec::with_capacity(members.len());
    let mut visited: HashSet<String> = HashSet::with_capacity(members.len());
    let mut from = head.key.clone();
    let mut next = head.successor.clone();
    let mut anomaly = None;

    while next != TAIL {
        if visited.contains(&next) {
            anomaly = Some(ChainAnomaly::Cycle { from, to: next });
            break;
        }
        match members.remove(&next) {
            Some(record) => {
                visited.insert(record.key.clone());
                from = record.key.clone();
                next = record.successor.clone();
                ordered.push(record);
            }
            None => {
                anomaly = Some(ChainAnomaly::Dangling {
                    from,
                    missing: next,
                });
                break;
            }
        }
    }

    Followed {
        head_present: true,
        ordered,
        unreachable: sorted(members.into_values().collect()),
        anomaly,
    }
}

fn sorted(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
}
