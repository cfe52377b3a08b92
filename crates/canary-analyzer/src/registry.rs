//! Listener registry: resolves the identity named in an analysis request.
//!
//! The worker only ever sees a listener *identity* (a plain string); the
//! registry maps it back to a live listener. Identities that resolve to
//! nothing drop the result with a warning.

use crate::verdict::AnalysisResult;
use canary_watcher::HeapDump;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Receives the original descriptor together with the computed verdict.
pub trait AnalysisResultListener: Send + Sync {
    fn on_result(&self, heap_dump: HeapDump, result: AnalysisResult);
}

/// Maps listener identities to listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<String, Arc<dyn AnalysisResultListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under the given identity, replacing any previous
    /// listener with the same identity.
    pub fn register(&self, identity: impl Into<String>, listener: Arc<dyn AnalysisResultListener>) {
        self.listeners.write().insert(identity.into(), listener);
    }

    /// Remove the listener registered under `identity`, if any.
    pub fn unregister(&self, identity: &str) {
        self.listeners.write().remove(identity);
    }

    pub fn resolve(&self, identity: &str) -> Option<Arc<dyn AnalysisResultListener>> {
        self.listeners.read().get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}
