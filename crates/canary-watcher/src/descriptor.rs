//! The heap-dump descriptor produced for a confirmed leak.

use crate::retention::RetentionKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Named exclusion rules for known false-positive retention patterns.
///
/// Carried opaquely from the watcher to the analysis step; the watcher never
/// interprets the entries. Deciding the rules themselves is up to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRules {
    entries: BTreeSet<String>,
}

impl ExclusionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named rule entry.
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entries.insert(entry.into());
        self
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable descriptor for one confirmed leak.
///
/// Bundles everything the out-of-process analysis step needs: the snapshot
/// location, the suspect key and its name, the exclusion rules in effect,
/// and three duration measurements. Built exactly once per confirmed leak
/// and transferred by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapDump {
    /// Location of the captured snapshot.
    pub snapshot_path: PathBuf,
    /// Key of the leaked watch call.
    pub key: RetentionKey,
    /// Human-readable name given at watch time; may be empty.
    pub name: String,
    /// Exclusion rules in effect when the leak was confirmed.
    pub exclusion_rules: ExclusionRules,
    /// Time between the watch call and the start of the confirmation attempt.
    pub watch_duration_ms: u64,
    /// Time spent in the forced-collection step.
    pub gc_duration_ms: u64,
    /// Time spent capturing the snapshot.
    pub heap_dump_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_rules_hold_named_entries() {
        let rules = ExclusionRules::new()
            .with_entry("static InputMethodManager.mCurRootView")
            .with_entry("thread main");
        assert_eq!(rules.len(), 2);
        assert!(rules.contains("thread main"));
        assert!(!rules.contains("thread other"));
    }

    #[test]
    fn descriptor_serializes_round_trip() {
        let heap_dump = HeapDump {
            snapshot_path: PathBuf::from("/tmp/leak.snapshot"),
            key: RetentionKey::generate(),
            name: String::from("activity-main"),
            exclusion_rules: ExclusionRules::new().with_entry("thread main"),
            watch_duration_ms: 12,
            gc_duration_ms: 3,
            heap_dump_duration_ms: 140,
        };
        let json = serde_json::to_string(&heap_dump).unwrap();
        let back: HeapDump = serde_json::from_str(&json).unwrap();
        assert_eq!(back, heap_dump);
    }
}
