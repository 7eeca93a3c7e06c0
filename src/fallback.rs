//! Fallback guard: substitutes a safe default when the inner chain fails
//!
//! The guard sits outermost in a pipeline so it observes the final failure
//! from every inner layer — an exhausted retry's timeout as much as a
//! circuit-open rejection. Which failure kinds it absorbs is a policy
//! decision expressed by a predicate, not hardcoded; the default handles
//! timeouts and open circuits, the two kinds a caller most commonly wants a
//! degraded answer for. Cancellation is deliberately not in the default set:
//! a caller that aborted does not want a substitute result.

use std::future::Future;
use std::sync::Arc;

use crate::error::{CallError, CallResult};
use crate::events::PipelineEvents;

/// Decides whether a failure is absorbed and replaced by the fallback value
pub type FallbackPredicate = Arc<dyn Fn(&CallError) -> bool + Send + Sync>;

/// Substitutes a configured value for handled failures
#[derive(Clone)]
pub struct FallbackGuard<T> {
    value: T,
    is_handled: FallbackPredicate,
    events: Arc<dyn PipelineEvents>,
}

impl<T: Clone> FallbackGuard<T> {
    /// Create a guard substituting `value` for timeouts and circuit-open
    /// rejections (the default handled set)
    pub fn new(value: T, events: Arc<dyn PipelineEvents>) -> Self {
        Self {
            value,
            is_handled: Arc::new(|err| {
                matches!(
                    err,
                    CallError::Timeout { .. } | CallError::CircuitOpen { .. }
                )
            }),
            events,
        }
    }

    /// Replace the handled-failure predicate
    pub fn with_predicate(mut self, is_handled: FallbackPredicate) -> Self {
        self.is_handled = is_handled;
        self
    }

    /// The value substituted for handled failures
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Run the inner chain; absorb handled failures, propagate the rest
    pub async fn run(
        &self,
        dependency: &str,
        inner: impl Future<Output = CallResult<T>>,
    ) -> CallResult<T> {
        match inner.await {
            Ok(value) => Ok(value),
            Err(err) if (self.is_handled)(&err) => {
                self.events.on_fallback(dependency, &err);
                Ok(self.value.clone())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEvents;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingEvents {
        fallbacks: AtomicU32,
    }

    impl PipelineEvents for CountingEvents {
        fn on_fallback(&self, _dependency: &str, _suppressed: &CallError) {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn guard(value: i32) -> FallbackGuard<i32> {
        FallbackGuard::new(value, Arc::new(NoopEvents))
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = guard(-1).run("svc", async { Ok(10) }).await;
        assert_eq!(result, Ok(10));
    }

    #[tokio::test]
    async fn test_timeout_is_substituted() {
        let events = Arc::new(CountingEvents::default());
        let guard = FallbackGuard::new(-1, events.clone());

        let result = guard
            .run("svc", async {
                Err(CallError::Timeout {
                    waited: Duration::from_millis(5),
                })
            })
            .await;

        assert_eq!(result, Ok(-1));
        assert_eq!(events.fallbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_circuit_open_is_substituted() {
        let result = guard(-1)
            .run("svc", async {
                Err(CallError::CircuitOpen {
                    dependency: "svc".to_string(),
                })
            })
            .await;
        assert_eq!(result, Ok(-1));
    }

    #[tokio::test]
    async fn test_unhandled_propagates_untouched() {
        let result = guard(-1)
            .run("svc", async { Err(CallError::unhandled("404 not found")) })
            .await;
        assert_eq!(result, Err(CallError::unhandled("404 not found")));
    }

    #[tokio::test]
    async fn test_cancelled_not_substituted_by_default() {
        let result = guard(-1).run("svc", async { Err(CallError::Cancelled) }).await;
        assert_eq!(result, Err(CallError::Cancelled));
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let guard = guard(-1).with_predicate(Arc::new(|err| {
            matches!(err, CallError::Transient(_))
        }));

        let result = guard
            .run("svc", async { Err(CallError::transient("reset")) })
            .await;
        assert_eq!(result, Ok(-1));

        let result = guard
            .run("svc", async {
                Err(CallError::Timeout {
                    waited: Duration::from_millis(5),
                })
            })
            .await;
        assert!(matches!(result, Err(CallError::Timeout { .. })));
    }
}
