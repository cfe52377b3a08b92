//! The reference watcher and its confirmation protocol.

use crate::contracts::{
    DebuggerControl, DumpOutcome, GcTrigger, HeapDumpListener, HeapDumper, Retry, RetryExecutor,
};
use crate::descriptor::{ExclusionRules, HeapDump};
use crate::retention::{ObservationQueue, RetainedKeys, RetentionKey, TrackedHandle};
use std::any::Any;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::debug;

/// Watches references that should have been released and confirms leaks.
///
/// Thread-safe and cheap to clone: [`RefWatcher::watch`] can be called from
/// any thread and never blocks. The confirmation protocol runs on the
/// configured [`RetryExecutor`].
#[derive(Clone)]
pub struct RefWatcher {
    // None is the disabled sentinel: watch becomes a no-op.
    inner: Option<Arc<WatcherInner>>,
}

struct WatcherInner {
    executor: Arc<dyn RetryExecutor>,
    debugger_control: Arc<dyn DebuggerControl>,
    gc_trigger: Arc<dyn GcTrigger>,
    heap_dumper: Arc<dyn HeapDumper>,
    listener: Arc<dyn HeapDumpListener>,
    exclusion_rules: ExclusionRules,
    retained: RetainedKeys,
    queue: ObservationQueue,
}

impl RefWatcher {
    pub(crate) fn from_parts(
        executor: Arc<dyn RetryExecutor>,
        debugger_control: Arc<dyn DebuggerControl>,
        gc_trigger: Arc<dyn GcTrigger>,
        heap_dumper: Arc<dyn HeapDumper>,
        listener: Arc<dyn HeapDumpListener>,
        exclusion_rules: ExclusionRules,
    ) -> Self {
        Self {
            inner: Some(Arc::new(WatcherInner {
                executor,
                debugger_control,
                gc_trigger,
                heap_dumper,
                listener,
                exclusion_rules,
                retained: RetainedKeys::new(),
                queue: ObservationQueue::new(),
            })),
        }
    }

    /// A watcher whose `watch` is a no-op.
    ///
    /// Use this inside the analysis worker's own process to avoid the
    /// analyzer recursively watching itself. Disabling is decided at
    /// construction time; there is no way to suppress scheduled work later.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Whether this watcher is the disabled sentinel.
    pub fn is_disabled(&self) -> bool {
        self.inner.is_none()
    }

    /// Watch the given object with an empty name.
    ///
    /// See [`RefWatcher::watch_with_name`].
    pub fn watch<T: Any + Send + Sync>(&self, object: &Arc<T>) {
        self.watch_with_name(object, "");
    }

    /// Watch the given object and confirm asynchronously that it gets
    /// released.
    ///
    /// Holds only a `Weak` reference; the object stays owned by the caller.
    /// Returns immediately; the confirmation protocol is scheduled on the
    /// retry executor. `name` is a logical identifier carried into the
    /// heap-dump descriptor and may be empty.
    pub fn watch_with_name<T: Any + Send + Sync>(&self, object: &Arc<T>, name: &str) {
        // Bind before coercing: annotating the binding directly would flow
        // the trait-object type back into `Arc::downgrade`.
        let weak = Arc::downgrade(object);
        self.begin_watch(weak, name);
    }

    /// Watch an already type-erased object.
    ///
    /// Same contract as [`RefWatcher::watch_with_name`], for callers that
    /// hold their objects as `Arc<dyn Any + Send + Sync>`.
    pub fn watch_dyn(&self, object: &Arc<dyn Any + Send + Sync>, name: &str) {
        self.begin_watch(Arc::downgrade(object), name);
    }

    fn begin_watch(&self, referent: Weak<dyn Any + Send + Sync>, name: &str) {
        let Some(inner) = &self.inner else {
            return;
        };
        let watched_at = Instant::now();
        let key = RetentionKey::generate();
        inner.retained.insert(key.clone());

        inner
            .queue
            .register(TrackedHandle::new(key.clone(), name, referent, watched_at));
        debug!(key = %key, name, "watching reference");

        let protocol = Arc::clone(inner);
        let name = name.to_string();
        inner
            .executor
            .execute(Box::new(move || protocol.ensure_gone(&key, &name, watched_at)));
    }

    /// Number of keys still considered possibly alive.
    pub fn retained_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.retained.len())
    }
}

impl WatcherInner {
    /// One confirmation attempt. Steps are strictly sequential; later steps
    /// depend on the side effects of earlier ones.
    fn ensure_gone(&self, key: &RetentionKey, name: &str, watched_at: Instant) -> Retry {
        let gc_started = Instant::now();
        let watch_duration = gc_started.duration_since(watched_at);

        self.remove_released_references();

        if self.debugger_control.is_debugger_attached() {
            // The debugger can create false leaks.
            debug!(key = %key, "debugger attached, deferring leak check");
            return Retry::Retry;
        }
        if self.gone(key) {
            return Retry::Done;
        }

        // The object may be pending a collection cycle that has not run yet;
        // give it one more chance before declaring a leak.
        self.gc_trigger.run_gc();
        self.remove_released_references();
        if self.gone(key) {
            debug!(key = %key, "reference released after forced collection");
            return Retry::Done;
        }

        // Still retained after two drains: confirmed leak.
        let dump_started = Instant::now();
        let gc_duration = dump_started.duration_since(gc_started);
        let snapshot_path = match self.heap_dumper.dump_heap() {
            DumpOutcome::Snapshot(path) => path,
            DumpOutcome::RetryLater => {
                debug!(key = %key, "could not dump heap, deferring");
                return Retry::Retry;
            }
        };
        let heap_dump_duration = dump_started.elapsed();

        self.listener.analyze(HeapDump {
            snapshot_path,
            key: key.clone(),
            name: name.to_string(),
            exclusion_rules: self.exclusion_rules.clone(),
            watch_duration_ms: watch_duration.as_millis() as u64,
            gc_duration_ms: gc_duration.as_millis() as u64,
            heap_dump_duration_ms: heap_dump_duration.as_millis() as u64,
        });
        Retry::Done
    }

    fn gone(&self, key: &RetentionKey) -> bool {
        !self.retained.contains(key)
    }

    /// Drain the observation queue, dropping drained keys from the retained
    /// set. This is the only path that removes keys.
    fn remove_released_references(&self) {
        for handle in self.queue.drain() {
            debug!(key = %handle.key(), name = handle.name(), "reference released");
            self.retained.remove(handle.key());
        }
    }
}
