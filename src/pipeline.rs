//! Policy pipeline: composes the resilience layers into one callable
//!
//! Composition order is fixed, outermost first:
//!
//! ```text
//! Fallback → CircuitBreaker → Retry → Timeout → operation
//! ```
//!
//! - Fallback is outermost so it observes the final failure from every inner
//!   layer, circuit-open rejections included.
//! - The breaker guards each admitted attempt: every executed attempt records
//!   its outcome into the breaker's statistics exactly once, and an attempt
//!   arriving at an open breaker fails with [`CallError::CircuitOpen`] —
//!   which is never retryable, so the retry loop terminates immediately and
//!   a single logical call cannot retry its way around an open circuit.
//! - Timeout is innermost so one admitted attempt produces exactly one
//!   recorded outcome, timeouts included.
//!
//! Layers omitted by configuration collapse without reordering the rest.
//!
//! # Example
//!
//! ```no_run
//! use faultgate::{PolicyParameters, PolicyPipeline, RetryParameters, TripPolicy, CallError};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), faultgate::ConfigError> {
//! let params = PolicyParameters {
//!     retry: RetryParameters {
//!         max_attempts: 3,
//!         delay: Duration::from_millis(200),
//!     },
//!     per_attempt_timeout: Duration::from_secs(1),
//!     trip: TripPolicy::ConsecutiveFailures {
//!         failure_threshold: 5,
//!         break_duration: Duration::from_secs(30),
//!     },
//!     fallback: Some(false),
//! };
//!
//! let pipeline = PolicyPipeline::new("token-service", params)?;
//! let valid = pipeline
//!     .invoke(|| async {
//!         // the remote call
//!         Ok::<_, CallError>(true)
//!     })
//!     .await;
//! # let _ = valid;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::{CircuitBreaker, TripPolicy};
use crate::config::ConfigError;
use crate::error::CallResult;
use crate::events::{PipelineEvents, TracingEvents};
use crate::fallback::{FallbackGuard, FallbackPredicate};
use crate::retry::{RetryExecutor, RetryPredicate};
use crate::timeout::TimeoutGuard;

/// Retry parameters for one dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryParameters {
    /// Retries after the first attempt; 0 disables retrying
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

/// Fully resolved policy parameters for one dependency.
///
/// How these are populated (settings file, environment, hardcoded) is the
/// caller's concern; see [`crate::config`] for the serde-backed layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyParameters<T> {
    /// Retry bounds; `max_attempts = 0` omits the retry layer's waits
    pub retry: RetryParameters,
    /// Per-attempt time budget; zero omits the timeout layer
    pub per_attempt_timeout: Duration,
    /// Circuit breaker trip policy
    pub trip: TripPolicy,
    /// Value substituted for handled failures; `None` omits the fallback layer
    pub fallback: Option<T>,
}

impl<T> Default for PolicyParameters<T> {
    /// All layers disabled: the pipeline is a transparent pass-through.
    fn default() -> Self {
        Self {
            retry: RetryParameters::default(),
            per_attempt_timeout: Duration::ZERO,
            trip: TripPolicy::Disabled,
            fallback: None,
        }
    }
}

impl<T> PolicyParameters<T> {
    /// Set the fallback value (enables the fallback layer)
    pub fn with_fallback(mut self, value: T) -> Self {
        self.fallback = Some(value);
        self
    }

    /// Check the structural invariants of the trip policy
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trip.validate()
    }
}

/// The composed resilience pipeline for one named dependency.
///
/// Construction fixes the parameters; the only mutable state referenced by
/// an invocation is the shared [`CircuitBreaker`].
#[derive(Clone)]
pub struct PolicyPipeline<T> {
    name: String,
    timeout: TimeoutGuard,
    retry: RetryExecutor,
    breaker: Arc<CircuitBreaker>,
    fallback: Option<FallbackGuard<T>>,
}

impl<T: Clone> PolicyPipeline<T> {
    /// Build a pipeline with the default [`TracingEvents`] listener
    pub fn new(name: impl Into<String>, params: PolicyParameters<T>) -> Result<Self, ConfigError> {
        Self::with_events(name, params, Arc::new(TracingEvents))
    }

    /// Build a pipeline with a caller-supplied lifecycle listener
    pub fn with_events(
        name: impl Into<String>,
        params: PolicyParameters<T>,
        events: Arc<dyn PipelineEvents>,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let name = name.into();
        Ok(Self {
            timeout: TimeoutGuard::new(params.per_attempt_timeout),
            retry: RetryExecutor::new(params.retry.max_attempts, params.retry.delay, events.clone()),
            breaker: Arc::new(CircuitBreaker::new(name.clone(), params.trip, events.clone())?),
            fallback: params.fallback.map(|value| FallbackGuard::new(value, events)),
            name,
        })
    }

    /// Replace the retry layer's retryable-error predicate
    pub fn with_retry_predicate(mut self, is_retryable: RetryPredicate) -> Self {
        self.retry = self.retry.with_predicate(is_retryable);
        self
    }

    /// Replace the fallback layer's handled-error predicate (no-op when no
    /// fallback is configured)
    pub fn with_fallback_predicate(mut self, is_handled: FallbackPredicate) -> Self {
        self.fallback = self.fallback.map(|f| f.with_predicate(is_handled));
        self
    }

    /// The dependency name this pipeline was built for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared circuit breaker, for state observation and administrative
    /// reset
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Invoke the wrapped operation through the full pipeline.
    ///
    /// `op` must produce a fresh future per call; the retry layer invokes it
    /// once per attempt.
    pub async fn invoke<F, Fut>(&self, op: F) -> CallResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let op = &op;
        let attempts = self
            .retry
            .run(&self.name, || self.breaker.run(|| self.timeout.run(op())));

        match &self.fallback {
            Some(fallback) => fallback.run(&self.name, attempts).await,
            None => attempts.await,
        }
    }
}
