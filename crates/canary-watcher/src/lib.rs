//! canary-watcher - reference lifecycle watcher for leak detection.
//!
//! This crate watches objects that should have been released and confirms,
//! through a retry-tolerant protocol, whether they actually leaked. A
//! confirmed leak produces a [`HeapDump`] descriptor that is handed to a
//! [`HeapDumpListener`] for out-of-band analysis.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use canary_watcher::WatcherBuilder;
//!
//! #[tokio::main]
//! async fn main() {
//!     let watcher = WatcherBuilder::new().build().unwrap();
//!
//!     let session = Arc::new(String::from("session state"));
//!     // Non-blocking; the confirmation protocol runs on the retry executor.
//!     watcher.watch_with_name(&session, "session");
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller ──watch──▶ RefWatcher ──schedule──▶ RetryExecutor
//!                       │                         │
//!                       │                 ensure_gone (per attempt):
//!                       │                   drain → debugger? → gone?
//!                       │                   → gc → drain → gone?
//!                       │                   → dump → descriptor
//!                       ▼                         │
//!                 RetainedKeys ◀──drain── ObservationQueue
//!                                                 │
//!                                                 ▼
//!                                         HeapDumpListener
//! ```
//!
//! The watcher holds no strong reference to watched objects: each watch call
//! registers a [`TrackedHandle`] carrying a `Weak` reference, and the
//! observation queue's drain sweeps out handles whose referent has been
//! dropped.

pub mod builder;
pub mod contracts;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod retention;
pub mod watcher;

pub use builder::WatcherBuilder;
pub use contracts::{
    DebuggerControl, DumpOutcome, GcTrigger, HeapDumpListener, HeapDumper, LoggingListener,
    NoDebuggerControl, NoopGcTrigger, NoopHeapDumper, ProcDebuggerControl, Retry, RetryExecutor,
    Retryable,
};
pub use descriptor::{ExclusionRules, HeapDump};
pub use error::BuildError;
pub use executor::{BlockingRetryExecutor, TokioRetryExecutor};
pub use retention::{ObservationQueue, RetainedKeys, RetentionKey, TrackedHandle};
pub use watcher::RefWatcher;
