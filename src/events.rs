//! Lifecycle event seam for external observability
//!
//! The pipeline layers announce their decisions (a retry is about to wait, a
//! breaker tripped, a fallback value was substituted) through the
//! [`PipelineEvents`] trait. Implementations are purely informational: the
//! layers never block on them beyond the synchronous call, and nothing an
//! implementation does can alter control flow.
//!
//! Two implementations ship with the crate:
//! - [`TracingEvents`] — emits `tracing` events, the default for pipelines
//! - [`NoopEvents`] — discards everything, useful in tests
//!
//! # Example
//!
//! ```
//! use faultgate::events::PipelineEvents;
//! use faultgate::CallError;
//!
//! struct Metered;
//!
//! impl PipelineEvents for Metered {
//!     fn on_break(&self, dependency: &str, error: &CallError) {
//!         println!("breaker for {dependency} opened: {error}");
//!     }
//! }
//! ```

use crate::error::CallError;

/// Observer hooks invoked by pipeline layers at lifecycle transition points.
///
/// All methods have empty default bodies so an implementation only overrides
/// the events it cares about.
pub trait PipelineEvents: Send + Sync {
    /// A failed attempt will be retried after the configured delay.
    ///
    /// `attempt` is the number of the retry about to be made (1 = first
    /// retry, i.e. second attempt overall).
    fn on_retry(&self, dependency: &str, attempt: u32, error: &CallError) {
        let _ = (dependency, attempt, error);
    }

    /// The circuit breaker transitioned to Open. `error` is the failure that
    /// tripped it (or the failed half-open probe's outcome).
    fn on_break(&self, dependency: &str, error: &CallError) {
        let _ = (dependency, error);
    }

    /// The circuit breaker transitioned back to Closed after a successful probe.
    fn on_reset(&self, dependency: &str) {
        let _ = dependency;
    }

    /// A single probe call was admitted while the breaker is HalfOpen.
    fn on_half_open_probe(&self, dependency: &str) {
        let _ = dependency;
    }

    /// The fallback layer suppressed `suppressed` and substituted the
    /// configured fallback value.
    fn on_fallback(&self, dependency: &str, suppressed: &CallError) {
        let _ = (dependency, suppressed);
    }
}

/// Default listener: forwards lifecycle events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl PipelineEvents for TracingEvents {
    fn on_retry(&self, dependency: &str, attempt: u32, error: &CallError) {
        tracing::debug!(
            dependency,
            attempt,
            kind = error.kind(),
            %error,
            "retrying after failed attempt"
        );
    }

    fn on_break(&self, dependency: &str, error: &CallError) {
        tracing::warn!(dependency, kind = error.kind(), %error, "circuit opened");
    }

    fn on_reset(&self, dependency: &str) {
        tracing::info!(dependency, "circuit closed after successful probe");
    }

    fn on_half_open_probe(&self, dependency: &str) {
        tracing::debug!(dependency, "admitting half-open probe");
    }

    fn on_fallback(&self, dependency: &str, suppressed: &CallError) {
        tracing::info!(
            dependency,
            kind = suppressed.kind(),
            %suppressed,
            "substituting fallback value"
        );
    }
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl PipelineEvents for NoopEvents {}
