use crate::chain::signal::StopHandle;
use crate::chain::StepRegistry;
use crate::fetcher::Fetcher;
use std::any::Any;
use std::sync::Arc;

/// Arbitrary payload carried into a run
pub type ChainParam = Arc<dyn Any + Send + Sync>;

/// Read-only view of the chain that owns a run
pub struct ChainHandle<F> {
    fetcher: Arc<F>,
    steps: StepRegistry<F>,
}

impl<F: Fetcher> ChainHandle<F> {
    pub(crate) fn new(fetcher: Arc<F>, steps: StepRegistry<F>) -> Self {
        Self { fetcher, steps }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Number of steps currently registered on the chain
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

impl<F> Clone for ChainHandle<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            steps: self.steps.clone(),
        }
    }
}

/// Per-run state handed to every step and terminal callback
///
/// The context is built once per run. Each step receives a copy whose stop
/// handle targets that step only; callbacks deferred past their step get a
/// copy with the stop handle disarmed.
pub struct ChainContext<F> {
    stop: StopHandle,
    chain: ChainHandle<F>,
    param: Option<ChainParam>,
}

impl<F: Fetcher> ChainContext<F> {
    pub(crate) fn new(chain: ChainHandle<F>, param: Option<ChainParam>) -> Self {
        Self {
            stop: StopHandle::disarmed(),
            chain,
            param,
        }
    }

    /// Copy of this context whose stop handle targets the given step
    pub(crate) fn rebind(&self, stop: StopHandle) -> Self {
        Self {
            stop,
            chain: self.chain.clone(),
            param: self.param.clone(),
        }
    }

    /// Copy of this context that can no longer stop anything
    pub(crate) fn detached(&self) -> Self {
        self.rebind(StopHandle::disarmed())
    }

    /// Halts the remaining steps of the run gracefully
    ///
    /// Only effective while the step that received this context is running.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn can_stop(&self) -> bool {
        self.stop.is_armed()
    }

    pub fn chain(&self) -> &ChainHandle<F> {
        &self.chain
    }

    pub fn fetcher(&self) -> &F {
        self.chain.fetcher()
    }

    /// Status code of the response that triggered the run
    pub fn status_code(&self) -> u16 {
        self.fetcher().status_code()
    }

    /// The carried parameter, if one was set and has type `T`
    pub fn param<T: Any>(&self) -> Option<&T> {
        self.param.as_deref()?.downcast_ref::<T>()
    }

    pub fn has_param(&self) -> bool {
        self.param.is_some()
    }
}

impl<F> Clone for ChainContext<F> {
    fn clone(&self) -> Self {
        Self {
            stop: self.stop.clone(),
            chain: self.chain.clone(),
            param: self.param.clone(),
        }
    }
}

impl<F> std::fmt::Debug for ChainContext<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainContext")
            .field("stop_armed", &self.stop.is_armed())
            .field("has_param", &self.param.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::signal::{pair, StepSignal};
    use crate::fetcher::mock::MockFetcher;

    fn create_test_context(param: Option<ChainParam>) -> ChainContext<MockFetcher> {
        let handle = ChainHandle::new(Arc::new(MockFetcher::with_status(200)), StepRegistry::new());
        ChainContext::new(handle, param)
    }

    #[test]
    fn test_param_downcast() {
        let context = create_test_context(Some(Arc::new(42u32)));
        assert!(context.has_param());
        assert_eq!(context.param::<u32>(), Some(&42));
        assert_eq!(context.param::<String>(), None);
    }

    #[test]
    fn test_new_context_cannot_stop() {
        let context = create_test_context(None);
        assert!(!context.can_stop());
        assert!(context.param::<u32>().is_none());
        context.stop();
    }

    #[tokio::test]
    async fn test_rebind_targets_step_slot() {
        let context = create_test_context(None);
        let (slot, receiver) = pair(0);

        let step_context = context.rebind(StopHandle::armed(slot));
        assert!(step_context.can_stop());
        assert!(!step_context.detached().can_stop());

        step_context.stop();
        assert!(matches!(receiver.await, Ok(StepSignal::Stop)));
    }

    #[test]
    fn test_status_code_reads_fetcher() {
        let context = create_test_context(None);
        // The mock reports nothing until a request is made
        assert_eq!(context.status_code(), 0);
        assert_eq!(context.chain().step_count(), 0);
    }
}
