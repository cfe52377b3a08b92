//! Analysis verdicts and the external analysis algorithm contract.

use canary_watcher::{ExclusionRules, RetentionKey};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the analysis algorithm concluded about a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisVerdict {
    /// The suspect key is reachable from a GC root.
    LeakFound {
        /// Class or type name of the leaked object.
        class_name: String,
        /// Whether the retention path matched an exclusion rule.
        excluded: bool,
    },
    /// The suspect key was not reachable; the report was a false positive.
    NoLeak,
    /// Analysis could not complete.
    Failure { reason: String },
}

/// A verdict plus how long it took to compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub verdict: AnalysisVerdict,
    pub analysis_duration_ms: u64,
}

/// The external snapshot-analysis algorithm.
///
/// Parsing the snapshot and computing the retention path live behind this
/// trait; this crate only carries descriptors to it and verdicts from it.
pub trait HeapAnalyzer: Send + Sync {
    fn check_for_leak(
        &self,
        snapshot: &Path,
        key: &RetentionKey,
        rules: &ExclusionRules,
    ) -> AnalysisVerdict;
}

/// Placeholder analyzer for hosts that have not wired the real algorithm;
/// every verdict is a failure naming the missing piece.
#[derive(Debug, Default)]
pub struct UnavailableAnalyzer;

impl HeapAnalyzer for UnavailableAnalyzer {
    fn check_for_leak(
        &self,
        _snapshot: &Path,
        _key: &RetentionKey,
        _rules: &ExclusionRules,
    ) -> AnalysisVerdict {
        AnalysisVerdict::Failure {
            reason: String::from("no heap analyzer configured"),
        }
    }
}
