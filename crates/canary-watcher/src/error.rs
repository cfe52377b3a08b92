//! Error types for canary-watcher.
//!
//! The confirmation protocol itself never fails: deferral is expressed as
//! [`Retry::Retry`](crate::contracts::Retry) and everything else is logged.
//! The only error surface is construction-time misconfiguration.

use thiserror::Error;

/// Errors raised while building a [`RefWatcher`](crate::RefWatcher).
#[derive(Error, Debug)]
pub enum BuildError {
    /// No retry executor was provided and the default one could not be
    /// created because the builder ran outside a tokio runtime.
    #[error("no retry executor configured and no tokio runtime is available for the default one")]
    NoRetryExecutor,
}
