//! Configuration layer: raw policy sections to resolved parameters
//!
//! The pipeline core consumes only a fully resolved
//! [`PolicyParameters`](crate::PolicyParameters). This module is the pure
//! function in front of it: serde-deserializable sections shaped like the
//! per-dependency settings blocks of a typical service config (one `retry`
//! table, one `circuit_breaker` table with `basic`/`advanced` subtables and
//! an `enabled` flag), resolved with explicit precedence:
//!
//! - the breaker is disabled unless `enabled` is set
//! - an `advanced` section with a positive `failure_rate` wins over `basic`
//! - a `basic` section applies when its `failure_threshold` is positive
//! - `retry_count = 0` disables retrying; `timeout_ms = 0` disables the
//!   per-attempt timeout
//!
//! Durations are plain integers (`_ms` / `_secs` suffixed) so the sections
//! deserialize from any serde format without custom duration parsing.
//!
//! # Example
//!
//! ```
//! use faultgate::config::PolicySection;
//!
//! let section: PolicySection = toml::from_str(
//!     r#"
//!     [retry]
//!     retry_count = 3
//!     retry_delay_ms = 200
//!     timeout_ms = 1000
//!
//!     [circuit_breaker]
//!     enabled = true
//!
//!     [circuit_breaker.basic]
//!     failure_threshold = 5
//!     break_duration_secs = 30
//!     "#,
//! )
//! .unwrap();
//!
//! let params = section.resolve::<bool>().unwrap();
//! assert_eq!(params.retry.max_attempts, 3);
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::circuit_breaker::TripPolicy;
use crate::pipeline::{PolicyParameters, RetryParameters};

/// A policy parameter that violates a structural invariant
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Basic breaker threshold below the minimum of one failure
    #[error("failure_threshold must be at least 1 (got {0})")]
    InvalidFailureThreshold(u32),

    /// Failure rate outside the half-open interval (0, 1]
    #[error("failure_rate must be in (0, 1] (got {0})")]
    InvalidFailureRate(f64),

    /// A failure rate over fewer than two samples is statistically
    /// meaningless, so two is the floor
    #[error("minimum_throughput must be at least 2 (got {0})")]
    InvalidMinimumThroughput(u32),

    /// A zero-length sampling window can never hold a sample
    #[error("sampling_window must be non-zero")]
    ZeroSamplingWindow,
}

/// Raw retry/timeout section for one dependency
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Retries after the first attempt; 0 disables retrying
    pub retry_count: u32,
    /// Fixed delay between attempts, in milliseconds
    pub retry_delay_ms: u64,
    /// Per-attempt timeout, in milliseconds; 0 disables the timeout
    pub timeout_ms: u64,
}

/// Consecutive-failure breaker settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BasicBreakerSection {
    /// Consecutive failures allowed before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open, in seconds
    pub break_duration_secs: u64,
}

/// Failure-rate breaker settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdvancedBreakerSection {
    /// Failed fraction in (0, 1] that opens the circuit
    pub failure_rate: f64,
    /// Trailing sampling window, in seconds
    pub sampling_window_secs: u64,
    /// Minimum sampled calls before the rate applies
    pub minimum_throughput: u32,
    /// How long the circuit stays open, in seconds
    pub break_duration_secs: u64,
}

impl Default for AdvancedBreakerSection {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            sampling_window_secs: 0,
            // Floor accepted by the rate evaluation; see ConfigError docs.
            minimum_throughput: 2,
            break_duration_secs: 0,
        }
    }
}

/// Raw circuit breaker section for one dependency
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    /// Master switch; when false the whole section is ignored
    pub enabled: bool,
    /// Consecutive-failure variant
    pub basic: Option<BasicBreakerSection>,
    /// Failure-rate variant; takes precedence over `basic` when populated
    pub advanced: Option<AdvancedBreakerSection>,
}

/// The full raw policy block for one dependency name
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Retry and per-attempt timeout settings
    pub retry: RetrySection,
    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerSection,
}

impl PolicySection {
    /// Resolve this section into validated [`PolicyParameters`].
    ///
    /// The fallback value is typed, not file-borne; attach it afterwards
    /// with [`PolicyParameters::with_fallback`].
    pub fn resolve<T>(&self) -> Result<PolicyParameters<T>, ConfigError> {
        let params = PolicyParameters {
            retry: RetryParameters {
                max_attempts: self.retry.retry_count,
                delay: Duration::from_millis(self.retry.retry_delay_ms),
            },
            per_attempt_timeout: Duration::from_millis(self.retry.timeout_ms),
            trip: self.resolve_trip(),
            fallback: None,
        };
        params.validate()?;
        Ok(params)
    }

    fn resolve_trip(&self) -> TripPolicy {
        let section = &self.circuit_breaker;
        if !section.enabled {
            return TripPolicy::Disabled;
        }

        if let Some(advanced) = &section.advanced {
            if advanced.failure_rate > 0.0 {
                return TripPolicy::FailureRate {
                    failure_rate: advanced.failure_rate,
                    sampling_window: Duration::from_secs(advanced.sampling_window_secs),
                    minimum_throughput: advanced.minimum_throughput,
                    break_duration: Duration::from_secs(advanced.break_duration_secs),
                };
            }
        }

        if let Some(basic) = &section.basic {
            if basic.failure_threshold > 0 {
                return TripPolicy::ConsecutiveFailures {
                    failure_threshold: basic.failure_threshold,
                    break_duration: Duration::from_secs(basic.break_duration_secs),
                };
            }
        }

        TripPolicy::Disabled
    }
}
