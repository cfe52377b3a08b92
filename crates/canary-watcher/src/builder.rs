//! Builder for [`RefWatcher`] with cascading defaults.

use crate::contracts::{
    DebuggerControl, GcTrigger, HeapDumpListener, HeapDumper, LoggingListener, NoDebuggerControl,
    NoopGcTrigger, NoopHeapDumper, RetryExecutor,
};
use crate::descriptor::ExclusionRules;
use crate::error::BuildError;
use crate::executor::TokioRetryExecutor;
use crate::watcher::RefWatcher;
use std::sync::Arc;

/// Builds [`RefWatcher`] instances, filling unset collaborators with
/// defaults.
///
/// Defaults: no-op gc trigger, never-attached debugger control, a heap
/// dumper that always defers, a listener that logs and drops descriptors,
/// empty exclusion rules, and a [`TokioRetryExecutor`] on the current
/// runtime. The executor default is the one fallible piece: building
/// outside a tokio runtime without an explicit executor fails with
/// [`BuildError::NoRetryExecutor`].
#[derive(Default)]
pub struct WatcherBuilder {
    executor: Option<Arc<dyn RetryExecutor>>,
    debugger_control: Option<Arc<dyn DebuggerControl>>,
    gc_trigger: Option<Arc<dyn GcTrigger>>,
    heap_dumper: Option<Arc<dyn HeapDumper>>,
    listener: Option<Arc<dyn HeapDumpListener>>,
    exclusion_rules: ExclusionRules,
}

impl WatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry executor that schedules confirmation attempts.
    pub fn retry_executor(mut self, executor: impl RetryExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Set the debugger check consulted before every attempt.
    pub fn debugger_control(mut self, control: impl DebuggerControl + 'static) -> Self {
        self.debugger_control = Some(Arc::new(control));
        self
    }

    /// Set the forced-collection hint.
    pub fn gc_trigger(mut self, trigger: impl GcTrigger + 'static) -> Self {
        self.gc_trigger = Some(Arc::new(trigger));
        self
    }

    /// Set the snapshot dumper invoked for confirmed leaks.
    pub fn heap_dumper(mut self, dumper: impl HeapDumper + 'static) -> Self {
        self.heap_dumper = Some(Arc::new(dumper));
        self
    }

    /// Set the listener that receives heap-dump descriptors.
    pub fn heap_dump_listener(mut self, listener: impl HeapDumpListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Shared form of [`WatcherBuilder::heap_dump_listener`] for listeners
    /// the host also keeps a handle to.
    pub fn heap_dump_listener_arc(mut self, listener: Arc<dyn HeapDumpListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Set the exclusion rules carried into every descriptor.
    pub fn exclusion_rules(mut self, rules: ExclusionRules) -> Self {
        self.exclusion_rules = rules;
        self
    }

    /// Build the watcher, applying defaults for unset collaborators.
    pub fn build(self) -> Result<RefWatcher, BuildError> {
        let executor: Arc<dyn RetryExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(TokioRetryExecutor::from_current()?),
        };
        Ok(RefWatcher::from_parts(
            executor,
            self.debugger_control
                .unwrap_or_else(|| Arc::new(NoDebuggerControl)),
            self.gc_trigger.unwrap_or_else(|| Arc::new(NoopGcTrigger)),
            self.heap_dumper.unwrap_or_else(|| Arc::new(NoopHeapDumper)),
            self.listener.unwrap_or_else(|| Arc::new(LoggingListener)),
            self.exclusion_rules,
        ))
    }
}
