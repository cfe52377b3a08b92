//! The serialized message crossing into the analysis worker.

use canary_watcher::HeapDump;
use serde::{Deserialize, Serialize};

/// One analysis request: which listener to notify, and the descriptor to
/// analyze. Transferred as JSON bytes through the worker inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Identity of the listener to resolve once analysis completes.
    pub listener: String,
    /// The confirmed leak's descriptor.
    pub heap_dump: HeapDump,
}

impl AnalysisRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canary_watcher::{ExclusionRules, RetentionKey};
    use std::path::PathBuf;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            listener: String::from("leak-report"),
            heap_dump: HeapDump {
                snapshot_path: PathBuf::from("/tmp/leak.snapshot"),
                key: RetentionKey::generate(),
                name: String::from("activity-main"),
                exclusion_rules: ExclusionRules::new(),
                watch_duration_ms: 10,
                gc_duration_ms: 2,
                heap_dump_duration_ms: 80,
            },
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let request = request();
        let bytes = request.to_bytes().unwrap();
        assert_eq!(AnalysisRequest::from_bytes(&bytes).unwrap(), request);
    }

    #[test]
    fn rejects_malformed_bytes() {
        assert!(AnalysisRequest::from_bytes(b"not a request").is_err());
        assert!(AnalysisRequest::from_bytes(b"{}").is_err());
    }
}
