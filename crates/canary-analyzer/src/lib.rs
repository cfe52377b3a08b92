//! canary-analyzer - isolated analysis dispatcher.
//!
//! Snapshot analysis is expensive and memory-hungry; running it inside the
//! observed workload could destabilize the very process being watched. This
//! crate runs the analysis step on its own dedicated worker, decoupled from
//! the watcher's scheduler, and relays verdicts back through a listener
//! registry.
//!
//! ```text
//! HeapDumpListener ──serialize──▶ worker inbox ──▶ analysis worker
//!  (DispatchingListener)                               │
//!                                              HeapAnalyzer verdict
//!                                                      │
//!                              ListenerRegistry ◀──────┘
//!                                      │
//!                           AnalysisResultListener
//! ```
//!
//! Dispatch is fire-and-forget: the watcher never waits on, or hears back
//! from, the worker. The hop into the worker and the hop back to the
//! listener are independent; the message in between is a serialized
//! [`AnalysisRequest`], and a malformed message is logged and skipped
//! rather than crashing the worker.

pub mod dispatcher;
pub mod message;
pub mod registry;
pub mod verdict;

pub use dispatcher::{AnalysisDispatcher, DispatchingListener};
pub use message::AnalysisRequest;
pub use registry::{AnalysisResultListener, ListenerRegistry};
pub use verdict::{AnalysisResult, AnalysisVerdict, HeapAnalyzer, UnavailableAnalyzer};
