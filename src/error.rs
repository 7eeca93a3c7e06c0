//! Error types for the resilience pipeline
//!
//! Every failure that flows through a pipeline is one of a small, closed set
//! of kinds. The wrapped operation itself only ever produces two of them —
//! [`CallError::Transient`] and [`CallError::Unhandled`] — via the caller's
//! classification of its raw error. The remaining kinds are produced by the
//! pipeline layers: [`CallError::Timeout`] by the timeout guard,
//! [`CallError::CircuitOpen`] by the circuit breaker, and
//! [`CallError::Cancelled`] by a caller-driven abort.
//!
//! Two predicates drive layer behaviour:
//! - [`CallError::is_retryable`] — whether the retry layer may re-attempt
//! - [`CallError::affects_health`] — whether the circuit breaker records the
//!   failure into its statistics

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type CallResult<T> = std::result::Result<T, CallError>;

/// A failure observed by (or produced by) a resilience pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// Caller-classified retryable fault (network reset, 5xx-equivalent, ...)
    #[error("transient fault: {0}")]
    Transient(String),

    /// A single attempt exceeded its per-attempt time budget
    #[error("attempt timed out after {waited:?}")]
    Timeout {
        /// How long the guard waited before giving up on the attempt
        waited: Duration,
    },

    /// The circuit breaker rejected the call without invoking the operation
    #[error("circuit open for dependency '{dependency}'")]
    CircuitOpen {
        /// Name of the dependency whose breaker is open
        dependency: String,
    },

    /// The caller aborted the invocation
    #[error("call cancelled by caller")]
    Cancelled,

    /// Caller-classified non-retryable failure, passed through verbatim
    #[error("{0}")]
    Unhandled(String),
}

impl CallError {
    /// Classify a raw operation failure as a transient (retryable) fault
    pub fn transient(cause: impl std::fmt::Display) -> Self {
        CallError::Transient(cause.to_string())
    }

    /// Classify a raw operation failure as unhandled (passed through verbatim)
    pub fn unhandled(cause: impl std::fmt::Display) -> Self {
        CallError::Unhandled(cause.to_string())
    }

    /// Whether the retry layer may re-attempt after this failure.
    ///
    /// Transient faults and per-attempt timeouts are retryable. An open
    /// circuit is never retryable — retrying would let a single logical call
    /// hammer a breaker that has already decided to fail fast. Cancellation
    /// is caller-driven and always terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Transient(_) | CallError::Timeout { .. })
    }

    /// Whether the circuit breaker records this failure into its statistics.
    ///
    /// Any failure of an executed call counts against dependency health,
    /// with two exceptions: cancellation (caller-driven, says nothing about
    /// the dependency) and circuit-open rejections (the operation was never
    /// invoked, so there is no outcome to record).
    pub fn affects_health(&self) -> bool {
        matches!(
            self,
            CallError::Transient(_) | CallError::Timeout { .. } | CallError::Unhandled(_)
        )
    }

    /// Short stable name for the error kind, for logging and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Transient(_) => "transient",
            CallError::Timeout { .. } => "timeout",
            CallError::CircuitOpen { .. } => "circuit_open",
            CallError::Cancelled => "cancelled",
            CallError::Unhandled(_) => "unhandled",
        }
    }
}
