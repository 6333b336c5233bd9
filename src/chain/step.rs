use crate::chain::{ChainContext, Completion};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

/// Future returned by a step; an `Err` counts as the step failing
pub type StepFuture = Pin<Box<dyn Future<Output = crate::Result<()>> + Send>>;

/// One unit of deferred work in a chain
pub type Step<F> = Arc<dyn Fn(Completion, ChainContext<F>) -> StepFuture + Send + Sync>;

/// Wraps a closure as a [`Step`]
///
/// Going through this function lets the closure's signature be inferred,
/// including the coercion of `Box::pin(async { .. })` to [`StepFuture`].
pub fn step_fn<F, S>(step: S) -> Step<F>
where
    S: Fn(Completion, ChainContext<F>) -> StepFuture + Send + Sync + 'static,
{
    Arc::new(step)
}

/// Ordered list of steps, shared by reference between a chain and its forks
///
/// Insertion order is execution order. Appending through any handle is
/// visible to every handle; runs work on a [`snapshot`](Self::snapshot) taken
/// when they start.
pub struct StepRegistry<F> {
    steps: Arc<RwLock<Vec<Step<F>>>>,
}

impl<F> StepRegistry<F> {
    pub fn new() -> Self {
        Self {
            steps: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub(crate) fn push(&self, step: Step<F>) {
        self.steps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(step);
    }

    pub fn len(&self) -> usize {
        self.steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Steps registered so far, in order
    pub(crate) fn snapshot(&self) -> Vec<Step<F>> {
        self.steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if both handles point at the same registry
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.steps, &other.steps)
    }
}

impl<F> Clone for StepRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            steps: Arc::clone(&self.steps),
        }
    }
}

impl<F> Default for StepRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> std::fmt::Debug for StepRegistry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("len", &self.len())
            .finish()
    }
}
