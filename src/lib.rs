//! Faultgate: a composable resilience pipeline for unreliable remote calls
//!
//! # Overview
//!
//! This crate wraps outbound calls to unreliable remote dependencies with an
//! ordered pipeline of fault-tolerance policies:
//!
//! - **Timeout**: bounds the wall-clock duration of a single attempt
//! - **Retry**: repeats transient failures up to a bound with a fixed delay
//! - **Circuit Breaker**: fails fast when a dependency is persistently down
//! - **Fallback**: substitutes a safe default when everything else failed
//!
//! A caller obtains the pipeline for a named dependency from the
//! [`PipelineRegistry`] and invokes it with a closure representing the
//! remote call. The registry guarantees one circuit breaker per dependency
//! name, shared by every concurrent caller — which is the entire point of
//! circuit breaking.
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - The transport performing the remote call (HTTP client, RPC stub,
//!   repository) — it only needs an async operation returning a result
//! - How policy parameters are sourced — it consumes a resolved
//!   [`PolicyParameters`] record (see [`config`] for a serde-backed layer)
//! - Telemetry sinks — it announces decisions through the
//!   [`events::PipelineEvents`] seam and never blocks on a listener
//!
//! # Architecture
//!
//! Execution flows outer-to-inner; each layer observes the result of the
//! layer inside it and may alter control flow.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Fallback                          │  ← Substitute safe default
//! └─────────────┬───────────────────────────┘
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Fail-fast protection
//! │  (shared state, one per dependency)     │
//! └─────────────┬───────────────────────────┘
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Retry                             │  ← Repeat transient failures
//! └─────────────┬───────────────────────────┘
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Timeout                           │  ← Bound attempt latency
//! └─────────────┬───────────────────────────┘
//!               ▼
//!        Remote Dependency
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use faultgate::{
//!     CallError, PipelineRegistry, PolicyParameters, RetryParameters, TripPolicy,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), faultgate::ConfigError> {
//! let registry: PipelineRegistry<bool> = PipelineRegistry::new();
//!
//! let params = PolicyParameters {
//!     retry: RetryParameters {
//!         max_attempts: 2,
//!         delay: Duration::from_millis(100),
//!     },
//!     per_attempt_timeout: Duration::from_secs(1),
//!     trip: TripPolicy::ConsecutiveFailures {
//!         failure_threshold: 3,
//!         break_duration: Duration::from_secs(30),
//!     },
//!     fallback: Some(true),
//! };
//! registry.get_or_create("token-service", params)?;
//!
//! let valid = registry
//!     .invoke("token-service", || async {
//!         // your remote call; classify raw failures on the way out
//!         Ok::<_, CallError>(true)
//!     })
//!     .await;
//! # let _ = valid;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod events;
pub mod fallback;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitState, TripPolicy};
pub use config::{ConfigError, PolicySection};
pub use error::{CallError, CallResult};
pub use events::{NoopEvents, PipelineEvents, TracingEvents};
pub use fallback::FallbackGuard;
pub use pipeline::{PolicyParameters, PolicyPipeline, RetryParameters};
pub use registry::PipelineRegistry;
pub use retry::RetryExecutor;
pub use timeout::TimeoutGuard;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use faultgate::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitState, TripPolicy};
    pub use super::config::{ConfigError, PolicySection};
    pub use super::error::{CallError, CallResult};
    pub use super::events::{NoopEvents, PipelineEvents, TracingEvents};
    pub use super::pipeline::{PolicyParameters, PolicyPipeline, RetryParameters};
    pub use super::registry::PipelineRegistry;
}
