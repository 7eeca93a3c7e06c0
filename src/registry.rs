//! Pipeline registry: one pipeline (and one breaker) per dependency name
//!
//! Circuit breaking only works if every caller of a logical dependency
//! shares one breaker's state. The registry guarantees that: the first
//! `get_or_create` for a name constructs and caches the pipeline, and every
//! later request for the same name returns the cached instance — a differing
//! parameters argument is ignored, parameters are fixed at first
//! construction. Construction is race-free: concurrent first requests for
//! the same new name produce exactly one pipeline.
//!
//! # Example
//!
//! ```no_run
//! use faultgate::{CallError, PipelineRegistry, PolicyParameters};
//!
//! # async fn example() -> Result<(), faultgate::ConfigError> {
//! let registry: PipelineRegistry<u64> = PipelineRegistry::new();
//! registry.get_or_create("inventory", PolicyParameters::default())?;
//!
//! let count = registry
//!     .invoke("inventory", || async { Ok::<_, CallError>(3) })
//!     .await;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::config::ConfigError;
use crate::error::{CallError, CallResult};
use crate::events::{PipelineEvents, TracingEvents};
use crate::pipeline::{PolicyParameters, PolicyPipeline};

/// Holds the composed pipeline for every known dependency name.
///
/// Cloning the registry clones the handle, not the contents; all clones see
/// the same pipelines.
#[derive(Clone)]
pub struct PipelineRegistry<T> {
    pipelines: Arc<RwLock<HashMap<String, Arc<PolicyPipeline<T>>>>>,
    events: Arc<dyn PipelineEvents>,
}

impl<T: Clone> PipelineRegistry<T> {
    /// Create an empty registry whose pipelines use [`TracingEvents`]
    pub fn new() -> Self {
        Self::with_events(Arc::new(TracingEvents))
    }

    /// Create an empty registry with a shared lifecycle listener for every
    /// pipeline it constructs
    pub fn with_events(events: Arc<dyn PipelineEvents>) -> Self {
        Self {
            pipelines: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// Return the pipeline for `name`, constructing and caching it on first
    /// request. Later calls ignore `params`.
    pub fn get_or_create(
        &self,
        name: &str,
        params: PolicyParameters<T>,
    ) -> Result<Arc<PolicyPipeline<T>>, ConfigError> {
        if let Some(pipeline) = self.pipelines.read().unwrap().get(name) {
            return Ok(pipeline.clone());
        }

        let mut pipelines = self.pipelines.write().unwrap();
        // Another caller may have won the construction race between locks.
        if let Some(pipeline) = pipelines.get(name) {
            return Ok(pipeline.clone());
        }

        let pipeline = Arc::new(PolicyPipeline::with_events(
            name,
            params,
            self.events.clone(),
        )?);
        pipelines.insert(name.to_string(), pipeline.clone());
        Ok(pipeline)
    }

    /// Look up an already-constructed pipeline
    pub fn get(&self, name: &str) -> Option<Arc<PolicyPipeline<T>>> {
        self.pipelines.read().unwrap().get(name).cloned()
    }

    /// Invoke `op` through the pipeline registered for `name`.
    ///
    /// This is the single entry point a transport layer needs. The pipeline
    /// must have been registered via [`get_or_create`](Self::get_or_create)
    /// first; invoking an unknown name is a wiring error reported as an
    /// [`CallError::Unhandled`] failure rather than a panic.
    pub async fn invoke<F, Fut>(&self, name: &str, op: F) -> CallResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        match self.get(name) {
            Some(pipeline) => pipeline.invoke(op).await,
            None => Err(CallError::unhandled(format!(
                "no pipeline registered for dependency '{name}'"
            ))),
        }
    }

    /// Names of all registered dependencies
    pub fn names(&self) -> Vec<String> {
        self.pipelines.read().unwrap().keys().cloned().collect()
    }

    /// Drop the pipeline for `name` (a later `get_or_create` rebuilds it
    /// with fresh breaker state)
    pub fn remove(&self, name: &str) {
        self.pipelines.write().unwrap().remove(name);
    }

    /// Number of registered dependencies
    pub fn len(&self) -> usize {
        self.pipelines.read().unwrap().len()
    }

    /// Whether any dependency is registered
    pub fn is_empty(&self) -> bool {
        self.pipelines.read().unwrap().is_empty()
    }
}

impl<T: Clone> Default for PipelineRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitState, TripPolicy};
    use crate::events::NoopEvents;
    use std::time::Duration;

    fn breaker_params(threshold: u32) -> PolicyParameters<i32> {
        PolicyParameters {
            trip: TripPolicy::ConsecutiveFailures {
                failure_threshold: threshold,
                break_duration: Duration::from_secs(30),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_same_name_yields_same_pipeline() {
        let registry: PipelineRegistry<i32> = PipelineRegistry::with_events(Arc::new(NoopEvents));

        let first = registry.get_or_create("svc-a", breaker_params(3)).unwrap();
        let second = registry.get_or_create("svc-a", breaker_params(99)).unwrap();

        // Same instance; the differing parameters on the second call are
        // ignored.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_first_requests_construct_once() {
        let registry: PipelineRegistry<i32> = PipelineRegistry::with_events(Arc::new(NoopEvents));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                registry.get_or_create("svc-a", breaker_params(3)).unwrap()
            }));
        }

        let pipelines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.len(), 1);
        for pipeline in &pipelines[1..] {
            assert!(Arc::ptr_eq(&pipelines[0], pipeline));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_names_have_independent_breakers() {
        let registry: PipelineRegistry<i32> = PipelineRegistry::with_events(Arc::new(NoopEvents));
        let a = registry.get_or_create("svc-a", breaker_params(1)).unwrap();
        let b = registry.get_or_create("svc-b", breaker_params(1)).unwrap();

        let _ = a
            .invoke(|| async { Err(crate::CallError::transient("down")) })
            .await;

        assert_eq!(a.breaker().state(), CircuitState::Open);
        assert_eq!(b.breaker().state(), CircuitState::Closed);
        assert_eq!(b.invoke(|| async { Ok(1) }).await, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_unknown_name_is_an_error() {
        let registry: PipelineRegistry<i32> = PipelineRegistry::with_events(Arc::new(NoopEvents));
        let result = registry.invoke("ghost", || async { Ok(1) }).await;
        assert!(matches!(result, Err(CallError::Unhandled(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_recreate_resets_breaker_state() {
        let registry: PipelineRegistry<i32> = PipelineRegistry::with_events(Arc::new(NoopEvents));
        let pipeline = registry.get_or_create("svc-a", breaker_params(1)).unwrap();
        let _ = pipeline
            .invoke(|| async { Err(crate::CallError::transient("down")) })
            .await;
        assert_eq!(pipeline.breaker().state(), CircuitState::Open);

        registry.remove("svc-a");
        let rebuilt = registry.get_or_create("svc-a", breaker_params(1)).unwrap();
        assert_eq!(rebuilt.breaker().state(), CircuitState::Closed);
    }

    #[test]
    fn test_names_and_emptiness() {
        let registry: PipelineRegistry<i32> = PipelineRegistry::with_events(Arc::new(NoopEvents));
        assert!(registry.is_empty());

        registry
            .get_or_create("svc-a", PolicyParameters::default())
            .unwrap();
        registry
            .get_or_create("svc-b", PolicyParameters::default())
            .unwrap();

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["svc-a".to_string(), "svc-b".to_string()]);
    }
}
