//! Chain verification
//!
//! Read-only check of the list invariants of one collection: a head exists
//! when there are members, exactly one tail, no shared successor values, every
//! member reachable from the head, and a walk that ends at the tail sentinel.

use crate::db::{head_key, Record};
use crate::ordering::follow::{follow, ChainAnomaly};
use serde::Serialize;
use std::collections::HashMap;

/// Diagnostic summary of a collection's chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub collection: String,
    pub head_present: bool,
    /// Member keys in chain order
    pub ordered: Vec<String>,
    /// Member keys whose successor is the tail sentinel
    pub tails: Vec<String>,
    /// Successor values shared by more than one record
    pub duplicate_successors: Vec<String>,
    /// Member keys not reachable from the head
    pub unreachable: Vec<String>,
    pub anomaly: Option<ChainAnomaly>,
}

impl ChainReport {
    /// Build the report from an unordered `by_collection` result
    pub fn from_records(collection: &str, records: Vec<Record>) -> Self {
        let head = head_key(collection);

        let mut successor_counts: HashMap<&str, usize> = HashMap::new();
        let mut tails = Vec::new();
        for record in &records {
            *successor_counts.entry(record.successor.as_str()).or_default() += 1;
            if record.key != head && record.is_tail() {
                tails.push(record.key.clone());
            }
        }
        tails.sort();

        let mut duplicate_successors: Vec<String> = successor_counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(successor, _)| successor.to_string())
            .collect();
        duplicate_successors.sort();

        let followed = follow(collection, records);

        Self {
            collection: collection.to_string(),
            head_present: followed.head_present,
            ordered: followed.ordered.into_iter().map(|r| r.key).collect(),
            tails,
            duplicate_successors,
            unreachable: followed.unreachable.into_iter().map(|r| r.key).collect(),
            anomaly: followed.anomaly,
        }
    }

    /// Whether every list invariant holds
    pub fn is_consistent(&self) -> bool {
        let tails_ok = if self.ordered.is_empty() {
            self.tails.is_empty()
        } else {
            self.tails.len() == 1 && self.ordered.last() == self.tails.first()
        };

        tails_ok
            && self.anomaly.is_none()
            && self.unreachable.is_empty()
            && self.duplicate_successors.is_empty()
    }

    /// Number of members (reachable or not)
    pub fn member_count(&self) -> usize {
        self.ordered.len() + self.unreachable.len()
    }
}

impl std::fmt::Display for ChainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "collection: {}", self.collection)?;
        writeln!(f, "head present: {}", self.head_present)?;
        writeln!(f, "order: {}", self.ordered.join(" -> "))?;
        writeln!(f, "tails: {:?}", self.tails)?;
        if !self.duplicate_successors.is_empty() {
            writeln!(f, "shared successors: {:?}", self.duplicate_successors)?;
        }
        if !self.unreachable.is_empty() {
            writeln!(f, "unreachable: {:?}", self.unreachable)?;
        }
        if let Some(anomaly) = &self.anomaly {
            writeln!(f, "anomaly: {:?}", anomaly)?;
        }
        write!(
            f,
            "consistent: {}",
            if self.is_consistent() { "yes" } else { "NO" }
        )
    }
}
