//! Circuit breaker: a shared per-dependency state machine that fails fast
//!
//! # States
//!
//! ```text
//! Closed ──trip condition holds──▶ Open
//! Open ──break_duration elapsed, next call──▶ HalfOpen (that call is the probe)
//! HalfOpen ──probe succeeds──▶ Closed
//! HalfOpen ──probe fails──▶ Open (fresh opened_at)
//! ```
//!
//! # Design
//!
//! - Trip conditions come in two flavours, mirroring the classic basic and
//!   advanced breakers: a consecutive-failure counter, or a failure rate over
//!   a trailing sampling window with a minimum throughput floor.
//! - Open → HalfOpen is evaluated lazily on the next incoming call, never by
//!   a background timer. Calls arriving before the deadline are rejected with
//!   [`CallError::CircuitOpen`] and do not reach the operation, so they are
//!   never recorded as outcomes.
//! - HalfOpen admits exactly one probe; concurrent arrivals are rejected
//!   immediately rather than queued.
//! - Every admission decision and outcome record happens under one mutex, so
//!   transitions are linearizable and each actual transition fires its
//!   [`PipelineEvents`] callback exactly once, no matter how many callers
//!   race around a threshold.
//!
//! The clock is `tokio::time::Instant`, so tests drive the break deadline
//! with paused virtual time.
//!
//! # Example
//!
//! ```no_run
//! use faultgate::{CircuitBreaker, TripPolicy, CallError};
//! use faultgate::events::TracingEvents;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     "billing-api",
//!     TripPolicy::ConsecutiveFailures {
//!         failure_threshold: 5,
//!         break_duration: Duration::from_secs(30),
//!     },
//!     Arc::new(TracingEvents),
//! )
//! .unwrap();
//!
//! let result = breaker.run(|| async { Ok::<_, CallError>(42) }).await;
//! # let _ = result;
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ConfigError;
use crate::error::{CallError, CallResult};
use crate::events::PipelineEvents;

/// When (and whether) a breaker trips from Closed to Open
#[derive(Debug, Clone, PartialEq)]
pub enum TripPolicy {
    /// Never trips; calls pass through unrecorded
    Disabled,

    /// Trip after `failure_threshold` consecutive failures since the last
    /// success
    ConsecutiveFailures {
        /// Consecutive failures required to open the circuit (>= 1)
        failure_threshold: u32,
        /// How long the circuit stays open before a probe is allowed
        break_duration: Duration,
    },

    /// Trip when, within the trailing `sampling_window`, at least
    /// `minimum_throughput` calls were sampled and the failed fraction
    /// reached `failure_rate`
    FailureRate {
        /// Failed fraction in (0, 1] that opens the circuit
        failure_rate: f64,
        /// Trailing window over which outcomes are sampled
        sampling_window: Duration,
        /// Minimum sampled calls before the rate is meaningful (>= 2)
        minimum_throughput: u32,
        /// How long the circuit stays open before a probe is allowed
        break_duration: Duration,
    },
}

impl TripPolicy {
    /// Whether this policy can ever trip
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TripPolicy::Disabled)
    }

    /// Check the structural invariants of this policy
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            TripPolicy::Disabled => Ok(()),
            TripPolicy::ConsecutiveFailures {
                failure_threshold, ..
            } => {
                if failure_threshold < 1 {
                    return Err(ConfigError::InvalidFailureThreshold(failure_threshold));
                }
                Ok(())
            }
            TripPolicy::FailureRate {
                failure_rate,
                sampling_window,
                minimum_throughput,
                ..
            } => {
                if !(failure_rate > 0.0 && failure_rate <= 1.0) {
                    return Err(ConfigError::InvalidFailureRate(failure_rate));
                }
                if sampling_window.is_zero() {
                    return Err(ConfigError::ZeroSamplingWindow);
                }
                if minimum_throughput < 2 {
                    return Err(ConfigError::InvalidMinimumThroughput(minimum_throughput));
                }
                Ok(())
            }
        }
    }

    fn break_duration(&self) -> Duration {
        match self {
            TripPolicy::Disabled => Duration::ZERO,
            TripPolicy::ConsecutiveFailures { break_duration, .. }
            | TripPolicy::FailureRate { break_duration, .. } => *break_duration,
        }
    }
}

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through and outcomes are recorded
    Closed,
    /// Failing fast; calls are rejected until the break deadline
    Open,
    /// Break deadline passed; a single probe decides the next state
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Closed,
    Open { opened_at: Instant },
    HalfOpen { probe_in_flight: bool },
}

#[derive(Debug)]
struct BreakerInner {
    state: State,
    consecutive_failures: u32,
    /// Timestamped outcome log (`true` = failure), kept only for the
    /// failure-rate policy and pruned lazily to the sampling window
    window: VecDeque<(Instant, bool)>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            window: VecDeque::new(),
        }
    }

    fn clear_counters(&mut self) {
        self.consecutive_failures = 0;
        self.window.clear();
    }
}

/// Releases a half-open probe slot if the admitted call is dropped before
/// its outcome is recorded (e.g. the caller drops the whole invocation).
/// Without this, an abandoned probe would wedge the breaker in HalfOpen.
struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_probe();
        }
    }
}

/// Shared per-dependency circuit breaker.
///
/// One instance exists per logical dependency (the registry guarantees
/// this); all concurrent callers observe and mutate the same state.
pub struct CircuitBreaker {
    dependency: String,
    policy: TripPolicy,
    inner: Mutex<BreakerInner>,
    events: Arc<dyn PipelineEvents>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("dependency", &self.dependency)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker for the named dependency. Rejects a trip policy
    /// that violates its structural invariants.
    pub fn new(
        dependency: impl Into<String>,
        policy: TripPolicy,
        events: Arc<dyn PipelineEvents>,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            dependency: dependency.into(),
            policy,
            inner: Mutex::new(BreakerInner::new()),
            events,
        })
    }

    /// Name of the dependency this breaker guards
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// The configured trip policy
    pub fn policy(&self) -> &TripPolicy {
        &self.policy
    }

    /// Snapshot of the current state.
    ///
    /// Open → HalfOpen is a lazy transition, so a breaker past its break
    /// deadline still reports Open until the next call arrives.
    pub fn state(&self) -> CircuitState {
        match self.inner.lock().unwrap().state {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Current consecutive-failure count (zero after a success or reset)
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().unwrap().consecutive_failures
    }

    /// Administrative reset back to Closed, clearing all counters.
    ///
    /// This is the only externally forced transition; everything else is
    /// derived from recorded outcomes and elapsed time.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = State::Closed;
        inner.clear_counters();
    }

    /// Run one admitted call through the breaker.
    ///
    /// If the circuit is open and the break deadline has not passed, the
    /// operation is never invoked and [`CallError::CircuitOpen`] is returned.
    /// Otherwise the operation executes and its outcome is recorded exactly
    /// once. Rejections are not recorded into the breaker's own statistics.
    pub async fn run<T, F, Fut>(&self, op: F) -> CallResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        if !self.policy.is_enabled() {
            return op().await;
        }

        let is_probe = self.try_admit()?;
        let mut slot = ProbeSlot {
            breaker: self,
            armed: is_probe,
        };

        let outcome = op().await;
        self.record(&outcome, is_probe);
        slot.armed = false;
        outcome
    }

    /// Decide admission for one call. Returns `Ok(true)` when the call was
    /// admitted as the half-open probe.
    fn try_admit(&self) -> Result<bool, CallError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => Ok(false),
            State::Open { opened_at } => {
                if Instant::now() >= opened_at + self.policy.break_duration() {
                    inner.state = State::HalfOpen {
                        probe_in_flight: true,
                    };
                    drop(inner);
                    self.events.on_half_open_probe(&self.dependency);
                    Ok(true)
                } else {
                    Err(self.rejection())
                }
            }
            State::HalfOpen { probe_in_flight } => {
                if probe_in_flight {
                    Err(self.rejection())
                } else {
                    inner.state = State::HalfOpen {
                        probe_in_flight: true,
                    };
                    drop(inner);
                    self.events.on_half_open_probe(&self.dependency);
                    Ok(true)
                }
            }
        }
    }

    /// Record the outcome of an executed (admitted) call and apply
    /// transition rules. `is_probe` marks the call admitted as the
    /// half-open probe; only that call's outcome may decide HalfOpen.
    fn record<T>(&self, outcome: &CallResult<T>, is_probe: bool) {
        match outcome {
            Ok(_) => self.record_success(is_probe),
            Err(CallError::Cancelled) => {
                if is_probe {
                    self.release_probe();
                }
            }
            Err(err) if err.affects_health() => self.record_failure(err, is_probe),
            // Circuit-open rejections never reach here; nothing else exists.
            Err(_) => {}
        }
    }

    fn record_success(&self, is_probe: bool) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_failures = 0;
                if let TripPolicy::FailureRate {
                    sampling_window, ..
                } = self.policy
                {
                    let now = Instant::now();
                    inner.window.push_back((now, false));
                    prune_window(&mut inner.window, now, sampling_window);
                }
            }
            State::HalfOpen { .. } if is_probe => {
                inner.state = State::Closed;
                inner.clear_counters();
                drop(inner);
                self.events.on_reset(&self.dependency);
            }
            // Stale result from a call admitted while Closed; the probe
            // still in flight decides the half-open state, not this.
            State::HalfOpen { .. } => {}
            // Late result from a call admitted before the trip; the break
            // decision stands until the deadline.
            State::Open { .. } => {}
        }
    }

    fn record_failure(&self, err: &CallError, is_probe: bool) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_failures += 1;
                if self.trip_condition_holds(&mut inner) {
                    inner.state = State::Open {
                        opened_at: Instant::now(),
                    };
                    inner.clear_counters();
                    drop(inner);
                    self.events.on_break(&self.dependency, err);
                }
            }
            State::HalfOpen { .. } if is_probe => {
                inner.state = State::Open {
                    opened_at: Instant::now(),
                };
                inner.clear_counters();
                drop(inner);
                self.events.on_break(&self.dependency, err);
            }
            // Stale failure from a call admitted while Closed; only the
            // probe's outcome decides.
            State::HalfOpen { .. } => {}
            // Late result from before the trip; already open.
            State::Open { .. } => {}
        }
    }

    /// Evaluate the trip condition after recording one more failure.
    /// Caller holds the lock; `inner.state` is Closed.
    fn trip_condition_holds(&self, inner: &mut BreakerInner) -> bool {
        match self.policy {
            TripPolicy::Disabled => false,
            TripPolicy::ConsecutiveFailures {
                failure_threshold, ..
            } => inner.consecutive_failures >= failure_threshold,
            TripPolicy::FailureRate {
                failure_rate,
                sampling_window,
                minimum_throughput,
                ..
            } => {
                let now = Instant::now();
                inner.window.push_back((now, true));
                prune_window(&mut inner.window, now, sampling_window);

                let total = inner.window.len() as u32;
                if total < minimum_throughput {
                    return false;
                }
                let failures = inner.window.iter().filter(|(_, failed)| *failed).count();
                failures as f64 / total as f64 >= failure_rate
            }
        }
    }

    /// Release the half-open probe slot without a transition (cancelled or
    /// abandoned probe).
    fn release_probe(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let State::HalfOpen {
            probe_in_flight: true,
        } = inner.state
        {
            inner.state = State::HalfOpen {
                probe_in_flight: false,
            };
        }
    }

    fn rejection(&self) -> CallError {
        CallError::CircuitOpen {
            dependency: self.dependency.clone(),
        }
    }
}

fn prune_window(window: &mut VecDeque<(Instant, bool)>, now: Instant, sampling_window: Duration) {
    while let Some((recorded_at, _)) = window.front() {
        if now.duration_since(*recorded_at) > sampling_window {
            window.pop_front();
        } else {
            break;
        }
    }
}
