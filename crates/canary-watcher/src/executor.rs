//! Retry executors: the scheduling side of the confirmation protocol.
//!
//! Attempts for one unit are always serialized; attempts for different
//! units may run in parallel.

use crate::contracts::{Retry, RetryExecutor, Retryable};
use crate::error::BuildError;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_BACKOFF_FACTOR: u32 = 64;

/// Default retry executor: one tokio task per unit.
///
/// Waits an initial delay before the first attempt (most objects are
/// released shortly after the watch call, so an eager first attempt would
/// mostly observe still-alive objects). On `Retry` the task sleeps
/// `initial_delay * factor`, with the factor starting at 1 and doubling per
/// deferral up to `max_backoff_factor`: with the defaults the waits are
/// 5s, 10s, 20s, ... capped at 320s (64 x 5s). Attempts run on the
/// blocking pool since the protocol may trigger collections and snapshot
/// dumps.
#[derive(Debug, Clone)]
pub struct TokioRetryExecutor {
    handle: Handle,
    initial_delay: Duration,
    max_backoff_factor: u32,
}

impl TokioRetryExecutor {
    /// Create an executor with the default delay policy (5s initial delay,
    /// doubling backoff capped at a factor of 64).
    pub fn new(handle: Handle) -> Self {
        Self::with_delays(handle, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_BACKOFF_FACTOR)
    }

    /// Create an executor with an explicit delay policy.
    pub fn with_delays(handle: Handle, initial_delay: Duration, max_backoff_factor: u32) -> Self {
        Self {
            handle,
            initial_delay,
            max_backoff_factor: max_backoff_factor.max(1),
        }
    }

    /// Create an executor on the current tokio runtime.
    pub fn from_current() -> Result<Self, BuildError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| BuildError::NoRetryExecutor)
    }
}

impl RetryExecutor for TokioRetryExecutor {
    fn execute(&self, unit: Box<dyn Retryable>) {
        let initial_delay = self.initial_delay;
        let max_backoff_factor = self.max_backoff_factor;
        self.handle.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut unit = unit;
            let mut backoff = 1u32;
            loop {
                let joined = tokio::task::spawn_blocking(move || {
                    let outcome = unit.run();
                    (unit, outcome)
                })
                .await;
                let outcome = match joined {
                    Ok((returned, outcome)) => {
                        unit = returned;
                        outcome
                    }
                    Err(err) => {
                        warn!(%err, "retryable unit did not complete, abandoning it");
                        break;
                    }
                };
                match outcome {
                    Retry::Done => break,
                    Retry::Retry => {
                        let wait = initial_delay.saturating_mul(backoff);
                        debug!(?wait, "attempt deferred, backing off");
                        tokio::time::sleep(wait).await;
                        backoff = backoff.saturating_mul(2).min(max_backoff_factor);
                    }
                }
            }
        });
    }
}

/// Same-thread executor: runs attempts immediately, up to a bounded number.
///
/// Blocks the caller, so it is only suitable for tests and for embedders
/// that drive confirmation from a thread they own.
#[derive(Debug)]
pub struct BlockingRetryExecutor {
    max_attempts: usize,
    retry_delay: Duration,
}

impl BlockingRetryExecutor {
    pub fn new(max_attempts: usize, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }
}

impl Default for BlockingRetryExecutor {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(20))
    }
}

impl RetryExecutor for BlockingRetryExecutor {
    fn execute(&self, mut unit: Box<dyn Retryable>) {
        for attempt in 1..=self.max_attempts {
            if unit.run() == Retry::Done {
                return;
            }
            if attempt < self.max_attempts {
                std::thread::sleep(self.retry_delay);
            }
        }
        warn!(
            max_attempts = self.max_attempts,
            "retryable unit still deferred after final attempt, abandoning it"
        );
    }
}
