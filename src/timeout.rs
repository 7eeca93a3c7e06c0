//! Timeout guard: bounds the wall-clock duration of a single attempt
//!
//! The guard races the wrapped operation against `tokio::time::timeout`. When
//! the budget elapses the attempt's future is dropped and the guard returns
//! [`CallError::Timeout`] immediately — abandon-and-move-on semantics. The
//! operation is not required to stop instantly; dropping the future is the
//! best-effort cancellation signal, which is all that can be promised for a
//! black-box operation without cooperative cancellation.
//!
//! A zero budget disables the guard entirely (pass-through).

use std::future::Future;
use std::time::Duration;

use crate::error::{CallError, CallResult};

/// Bounds a single attempt of a wrapped operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutGuard {
    per_attempt: Duration,
}

impl TimeoutGuard {
    /// Create a guard with the given per-attempt budget. A zero duration
    /// produces a disabled guard.
    pub fn new(per_attempt: Duration) -> Self {
        Self { per_attempt }
    }

    /// A guard that imposes no bound
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Whether this guard imposes a bound
    pub fn is_enabled(&self) -> bool {
        !self.per_attempt.is_zero()
    }

    /// The configured per-attempt budget (zero when disabled)
    pub fn per_attempt(&self) -> Duration {
        self.per_attempt
    }

    /// Run one attempt under the time budget
    pub async fn run<T>(&self, attempt: impl Future<Output = CallResult<T>>) -> CallResult<T> {
        if !self.is_enabled() {
            return attempt.await;
        }

        match tokio::time::timeout(self.per_attempt, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::Timeout {
                waited: self.per_attempt,
            }),
        }
    }
}
