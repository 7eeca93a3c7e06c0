//! Retry executor: repeats a failed attempt up to a bound with a fixed delay
//!
//! An operation is attempted up to `max_attempts + 1` times total (the first
//! attempt plus up to `max_attempts` retries). After a failing attempt the
//! executor consults its retry predicate; if the failure is retryable and
//! budget remains, it waits the configured fixed delay and tries again.
//! Cancellation and circuit-open rejections are always terminal regardless
//! of the predicate: a caller that aborted wants no more attempts, and an
//! open circuit has already decided this call fails fast.
//!
//! Only the final attempt's outcome is surfaced to the caller — in particular
//! the original error kind is preserved when the budget is exhausted, never
//! replaced by a generic "retries exhausted" error. Intermediate failures are
//! visible only through [`PipelineEvents::on_retry`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CallError, CallResult};
use crate::events::PipelineEvents;

/// Decides whether a failed attempt may be retried
pub type RetryPredicate = Arc<dyn Fn(&CallError) -> bool + Send + Sync>;

/// Repeats a failed operation with a fixed inter-attempt delay
#[derive(Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    delay: Duration,
    is_retryable: RetryPredicate,
    events: Arc<dyn PipelineEvents>,
}

impl RetryExecutor {
    /// Create an executor allowing up to `max_attempts` retries with `delay`
    /// between attempts. `max_attempts = 0` disables retrying (single
    /// attempt only). Uses [`CallError::is_retryable`] as the predicate.
    pub fn new(max_attempts: u32, delay: Duration, events: Arc<dyn PipelineEvents>) -> Self {
        Self {
            max_attempts,
            delay,
            is_retryable: Arc::new(CallError::is_retryable),
            events,
        }
    }

    /// Replace the retry predicate. Cancellation and circuit-open
    /// rejections remain terminal even if the predicate would accept them.
    pub fn with_predicate(mut self, is_retryable: RetryPredicate) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    /// Maximum number of retries after the first attempt
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fixed delay between attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run the operation, retrying per configuration. `make_attempt` is
    /// invoked once per attempt and must produce a fresh future each time.
    pub async fn run<T, F, Fut>(&self, dependency: &str, mut make_attempt: F) -> CallResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let mut retries_used = 0u32;

        loop {
            match make_attempt().await {
                Ok(value) => return Ok(value),
                // Terminal no matter what the predicate says.
                Err(err @ (CallError::Cancelled | CallError::CircuitOpen { .. })) => {
                    return Err(err);
                }
                Err(err) => {
                    if retries_used >= self.max_attempts || !(self.is_retryable)(&err) {
                        return Err(err);
                    }
                    retries_used += 1;
                    self.events.on_retry(dependency, retries_used, &err);
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEvents;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEvents {
        retries: Mutex<Vec<(u32, String)>>,
    }

    impl PipelineEvents for RecordingEvents {
        fn on_retry(&self, _dependency: &str, attempt: u32, error: &CallError) {
            self.retries
                .lock()
                .unwrap()
                .push((attempt, error.kind().to_string()));
        }
    }

    fn executor(max_attempts: u32, delay_ms: u64) -> RetryExecutor {
        RetryExecutor::new(
            max_attempts,
            Duration::from_millis(delay_ms),
            Arc::new(NoopEvents),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_invoked_exactly_n_plus_one_times() {
        let calls = AtomicU32::new(0);
        let result: CallResult<()> = executor(3, 10)
            .run("svc", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::transient("down")) }
            })
            .await;

        assert_eq!(result, Err(CallError::transient("down")));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_stops_retrying() {
        let calls = AtomicU32::new(0);
        let result = executor(5, 10)
            .run("svc", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CallError::transient("flaky"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: CallResult<()> = executor(5, 10)
            .run("svc", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::unhandled("bad request")) }
            })
            .await;

        assert_eq!(result, Err(CallError::unhandled("bad request")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_is_terminal_even_with_permissive_predicate() {
        let calls = AtomicU32::new(0);
        let executor = executor(5, 10).with_predicate(Arc::new(|_| true));
        let result: CallResult<()> = executor
            .run("svc", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::Cancelled) }
            })
            .await;

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_open_is_terminal_even_with_permissive_predicate() {
        let calls = AtomicU32::new(0);
        let executor = executor(5, 10).with_predicate(Arc::new(|_| true));
        let result: CallResult<()> = executor
            .run("svc", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CallError::CircuitOpen {
                        dependency: "svc".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(CallError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: CallResult<()> = executor(0, 10)
            .run("svc", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::transient("down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_elapses_between_attempts() {
        let started = tokio::time::Instant::now();
        let _: CallResult<()> = executor(2, 10)
            .run("svc", || async { Err(CallError::transient("down")) })
            .await;

        // Two retries, 10ms each, excluding attempt latency.
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_retry_fires_before_each_wait_with_original_error() {
        let events = Arc::new(RecordingEvents::default());
        let executor = RetryExecutor::new(2, Duration::from_millis(5), events.clone());

        let _: CallResult<()> = executor
            .run("svc", || async {
                Err(CallError::Timeout {
                    waited: Duration::from_millis(1),
                })
            })
            .await;

        let retries = events.retries.lock().unwrap();
        assert_eq!(
            *retries,
            vec![(1, "timeout".to_string()), (2, "timeout".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_error_kind_preserved_on_exhaustion() {
        let result: CallResult<()> = executor(1, 1)
            .run("svc", || async {
                Err(CallError::Timeout {
                    waited: Duration::from_millis(7),
                })
            })
            .await;

        assert_eq!(
            result,
            Err(CallError::Timeout {
                waited: Duration::from_millis(7)
            })
        );
    }
}
