//! Collaborator contracts for the reference watcher.
//!
//! Each contract is one small trait with a default implementation. The
//! watcher never inspects concrete types; every collaborator is
//! independently substitutable.

use crate::descriptor::HeapDump;
use std::path::PathBuf;
use tracing::warn;

/// Result of one confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// No further action needed for this watch call.
    Done,
    /// Re-run the attempt later; a deferral, not a failure.
    Retry,
}

/// A unit of work that may ask to be re-run.
pub trait Retryable: Send {
    fn run(&mut self) -> Retry;
}

impl<F> Retryable for F
where
    F: FnMut() -> Retry + Send,
{
    fn run(&mut self) -> Retry {
        self()
    }
}

/// Runs retryable units, re-invoking them on [`Retry::Retry`].
///
/// The executor must run a unit at least once and must never run two
/// attempts of the same unit concurrently. The re-attempt delay policy is
/// the executor's choice.
pub trait RetryExecutor: Send + Sync {
    fn execute(&self, unit: Box<dyn Retryable>);
}

/// Best-effort hint to run a collection cycle before declaring a leak.
///
/// Gives hosts with deferred reclamation (epoch schemes, embedded GC heaps,
/// arena recycling) one more chance to release the object. May be a no-op;
/// there is no guarantee a cycle completes before this returns.
pub trait GcTrigger: Send + Sync {
    fn run_gc(&self);
}

/// Default trigger: does nothing.
#[derive(Debug, Default)]
pub struct NoopGcTrigger;

impl GcTrigger for NoopGcTrigger {
    fn run_gc(&self) {}
}

/// Query for an attached debugger.
///
/// A debugger can suspend threads and create spurious "still reachable"
/// states, so the watcher defers detection wholesale while one is attached.
pub trait DebuggerControl: Send + Sync {
    fn is_debugger_attached(&self) -> bool;
}

/// Default control: never attached.
#[derive(Debug, Default)]
pub struct NoDebuggerControl;

impl DebuggerControl for NoDebuggerControl {
    fn is_debugger_attached(&self) -> bool {
        false
    }
}

/// Debugger detection via `/proc/self/status` (`TracerPid`).
///
/// On non-Linux platforms this always reports no debugger.
#[derive(Debug, Default)]
pub struct ProcDebuggerControl;

impl DebuggerControl for ProcDebuggerControl {
    #[cfg(target_os = "linux")]
    fn is_debugger_attached(&self) -> bool {
        let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
            return false;
        };
        status
            .lines()
            .find_map(|line| line.strip_prefix("TracerPid:"))
            .and_then(|pid| pid.trim().parse::<u32>().ok())
            .is_some_and(|pid| pid != 0)
    }

    #[cfg(not(target_os = "linux"))]
    fn is_debugger_attached(&self) -> bool {
        false
    }
}

/// Outcome of a snapshot dump request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    /// Snapshot written to the given path.
    Snapshot(PathBuf),
    /// Cannot dump right now (low storage, dumper busy); try again later.
    RetryLater,
}

/// Captures a heap snapshot for a confirmed leak.
///
/// "Can't dump now" is expressed through [`DumpOutcome::RetryLater`], never
/// through an error.
pub trait HeapDumper: Send + Sync {
    fn dump_heap(&self) -> DumpOutcome;
}

/// Default dumper: always asks to retry later.
///
/// A watcher left on this default never produces a descriptor, which is the
/// safe behavior for a host that has not wired a real dumper.
#[derive(Debug, Default)]
pub struct NoopHeapDumper;

impl HeapDumper for NoopHeapDumper {
    fn dump_heap(&self) -> DumpOutcome {
        DumpOutcome::RetryLater
    }
}

/// Receives exactly one [`HeapDump`] per confirmed leak.
pub trait HeapDumpListener: Send + Sync {
    fn analyze(&self, heap_dump: HeapDump);
}

/// Default listener: logs the descriptor and drops it.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl HeapDumpListener for LoggingListener {
    fn analyze(&self, heap_dump: HeapDump) {
        warn!(
            key = %heap_dump.key,
            name = %heap_dump.name,
            snapshot = %heap_dump.snapshot_path.display(),
            "leak confirmed but no analysis listener is wired, dropping heap dump"
        );
    }
}
