//! Integration tests for the watcher and its confirmation protocol.
//!
//! The protocol is driven by hand through a deferred executor so each test
//! controls exactly when attempts run and what happens between them.

use canary_watcher::{
    DumpOutcome, ExclusionRules, GcTrigger, HeapDump, HeapDumpListener, HeapDumper, RefWatcher,
    Retry, RetryExecutor, Retryable, WatcherBuilder,
};
use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Executor that stores units instead of running them; tests drive attempts
/// explicitly.
#[derive(Clone, Default)]
struct DeferredExecutor {
    units: Arc<Mutex<Vec<Box<dyn Retryable>>>>,
}

impl DeferredExecutor {
    fn unit_count(&self) -> usize {
        self.units.lock().unwrap().len()
    }

    /// Run one attempt of the unit at `index`.
    fn run(&self, index: usize) -> Retry {
        self.units.lock().unwrap()[index].run()
    }
}

impl RetryExecutor for DeferredExecutor {
    fn execute(&self, unit: Box<dyn Retryable>) {
        self.units.lock().unwrap().push(unit);
    }
}

#[derive(Clone, Default)]
struct RecordingListener {
    dumps: Arc<Mutex<Vec<HeapDump>>>,
}

impl RecordingListener {
    fn dumps(&self) -> Vec<HeapDump> {
        self.dumps.lock().unwrap().clone()
    }
}

impl HeapDumpListener for RecordingListener {
    fn analyze(&self, heap_dump: HeapDump) {
        self.dumps.lock().unwrap().push(heap_dump);
    }
}

#[derive(Clone)]
struct FixedDumper {
    outcome: DumpOutcome,
    dump_requests: Arc<AtomicUsize>,
}

impl FixedDumper {
    fn snapshot(path: &str) -> Self {
        Self {
            outcome: DumpOutcome::Snapshot(PathBuf::from(path)),
            dump_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn retry_later() -> Self {
        Self {
            outcome: DumpOutcome::RetryLater,
            dump_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn requests(&self) -> usize {
        self.dump_requests.load(Ordering::SeqCst)
    }
}

impl HeapDumper for FixedDumper {
    fn dump_heap(&self) -> DumpOutcome {
        self.dump_requests.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Gc trigger that releases a held strong reference, modeling an object
/// reclaimed by the forced collection between the two drains.
#[derive(Clone, Default)]
struct ReleasingGcTrigger {
    held: Arc<Mutex<Option<Arc<dyn Any + Send + Sync>>>>,
}

impl ReleasingGcTrigger {
    fn hold(&self, object: Arc<dyn Any + Send + Sync>) {
        *self.held.lock().unwrap() = Some(object);
    }
}

impl GcTrigger for ReleasingGcTrigger {
    fn run_gc(&self) {
        self.held.lock().unwrap().take();
    }
}

#[derive(Clone, Default)]
struct ToggleDebugger {
    attached: Arc<AtomicBool>,
}

impl canary_watcher::DebuggerControl for ToggleDebugger {
    fn is_debugger_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

fn watcher_with(
    executor: &DeferredExecutor,
    listener: &RecordingListener,
    dumper: &FixedDumper,
) -> RefWatcher {
    WatcherBuilder::new()
        .retry_executor(executor.clone())
        .heap_dump_listener(listener.clone())
        .heap_dumper(dumper.clone())
        .build()
        .unwrap()
}

#[test]
fn concurrent_watch_calls_yield_independent_keys() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::retry_later();
    let watcher = watcher_with(&executor, &listener, &dumper);

    let object = Arc::new(String::from("shared"));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let watcher = watcher.clone();
            let object = Arc::clone(&object);
            std::thread::spawn(move || watcher.watch(&object))
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    // Same object, eight watch calls, eight distinct keys.
    assert_eq!(watcher.retained_count(), 8);
    assert_eq!(executor.unit_count(), 8);
}

#[test]
fn already_released_object_is_done_without_a_dump() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::snapshot("/tmp/leak.snapshot");
    let watcher = watcher_with(&executor, &listener, &dumper);

    let object = Arc::new(vec![0u8; 16]);
    watcher.watch(&object);
    drop(object);

    assert_eq!(executor.run(0), Retry::Done);
    assert_eq!(watcher.retained_count(), 0);
    assert_eq!(dumper.requests(), 0);
    assert!(listener.dumps().is_empty());
}

#[test]
fn attached_debugger_defers_every_attempt() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::snapshot("/tmp/leak.snapshot");
    let debugger = ToggleDebugger::default();
    let watcher = WatcherBuilder::new()
        .retry_executor(executor.clone())
        .heap_dump_listener(listener.clone())
        .heap_dumper(dumper.clone())
        .debugger_control(debugger.clone())
        .build()
        .unwrap();

    let object = Arc::new(String::from("held"));
    watcher.watch(&object);

    debugger.attached.store(true, Ordering::SeqCst);
    assert_eq!(executor.run(0), Retry::Retry);
    assert_eq!(executor.run(0), Retry::Retry);
    assert_eq!(dumper.requests(), 0);

    // Debugger detaches and the object is released: normal completion.
    debugger.attached.store(false, Ordering::SeqCst);
    drop(object);
    assert_eq!(executor.run(0), Retry::Done);
    assert!(listener.dumps().is_empty());
}

#[test]
fn release_during_forced_collection_is_not_a_leak() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::snapshot("/tmp/leak.snapshot");
    let gc = ReleasingGcTrigger::default();
    let watcher = WatcherBuilder::new()
        .retry_executor(executor.clone())
        .heap_dump_listener(listener.clone())
        .heap_dumper(dumper.clone())
        .gc_trigger(gc.clone())
        .build()
        .unwrap();

    let object = Arc::new(String::from("pending collection"));
    watcher.watch(&object);
    // The trigger owns the last strong reference: the object survives the
    // first drain and is released by the forced collection.
    gc.hold(object);

    assert_eq!(executor.run(0), Retry::Done);
    assert_eq!(watcher.retained_count(), 0);
    assert_eq!(dumper.requests(), 0);
    assert!(listener.dumps().is_empty());
}

#[test]
fn confirmed_leak_produces_exactly_one_descriptor() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::snapshot("/tmp/leak.snapshot");
    let rules = ExclusionRules::new().with_entry("thread main");
    let watcher = WatcherBuilder::new()
        .retry_executor(executor.clone())
        .heap_dump_listener(listener.clone())
        .heap_dumper(dumper.clone())
        .exclusion_rules(rules.clone())
        .build()
        .unwrap();

    let object = Arc::new(String::from("leaked activity"));
    watcher.watch_with_name(&object, "activity-main");

    assert_eq!(executor.run(0), Retry::Done);
    assert_eq!(dumper.requests(), 1);

    let dumps = listener.dumps();
    assert_eq!(dumps.len(), 1);
    let dump = &dumps[0];
    assert_eq!(dump.snapshot_path, PathBuf::from("/tmp/leak.snapshot"));
    assert_eq!(dump.name, "activity-main");
    assert_eq!(dump.exclusion_rules, rules);
    assert!(watcher.retained_count() > 0, "leaked key stays retained");
    drop(object);
}

#[test]
fn unavailable_dumper_defers_without_reporting() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::retry_later();
    let watcher = watcher_with(&executor, &listener, &dumper);

    let object = Arc::new(String::from("leaked"));
    watcher.watch(&object);

    assert_eq!(executor.run(0), Retry::Retry);
    assert_eq!(dumper.requests(), 1);
    assert!(listener.dumps().is_empty());

    // A later attempt after release completes without a report.
    drop(object);
    assert_eq!(executor.run(0), Retry::Done);
    assert!(listener.dumps().is_empty());
}

#[test]
fn draining_removes_exactly_the_released_keys() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::retry_later();
    let watcher = watcher_with(&executor, &listener, &dumper);

    let first = Arc::new(String::from("first"));
    let second = Arc::new(String::from("second"));
    let third = Arc::new(String::from("third"));
    watcher.watch(&first);
    watcher.watch(&second);
    watcher.watch(&third);
    assert_eq!(watcher.retained_count(), 3);

    drop(second);
    // Any attempt drains the shared queue; the released key goes, the
    // others stay.
    assert_eq!(executor.run(1), Retry::Done);
    assert_eq!(watcher.retained_count(), 2);
}

#[test]
fn type_erased_objects_can_be_watched() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::retry_later();
    let watcher = watcher_with(&executor, &listener, &dumper);

    let object: Arc<dyn Any + Send + Sync> = Arc::new(String::from("erased"));
    watcher.watch_dyn(&object, "erased");
    assert_eq!(watcher.retained_count(), 1);

    drop(object);
    assert_eq!(executor.run(0), Retry::Done);
    assert_eq!(watcher.retained_count(), 0);
    assert!(listener.dumps().is_empty());
}

#[test]
fn disabled_watcher_ignores_watch_calls() {
    let watcher = RefWatcher::disabled();
    assert!(watcher.is_disabled());

    let object = Arc::new(String::from("ignored"));
    watcher.watch(&object);
    watcher.watch_with_name(&object, "ignored");
    assert_eq!(watcher.retained_count(), 0);
}

#[test]
fn durations_in_the_descriptor_are_measured() {
    let executor = DeferredExecutor::default();
    let listener = RecordingListener::default();
    let dumper = FixedDumper::snapshot("/tmp/leak.snapshot");
    let watcher = watcher_with(&executor, &listener, &dumper);

    let object = Arc::new(String::from("leaked"));
    watcher.watch(&object);
    std::thread::sleep(std::time::Duration::from_millis(5));

    assert_eq!(executor.run(0), Retry::Done);
    let dumps = listener.dumps();
    assert_eq!(dumps.len(), 1);
    assert!(dumps[0].watch_duration_ms >= 5);
    drop(object);
}
