//! Sequential step executor
//!
//! The dispatcher walks a snapshot of the step registry strictly in order.
//! For each step it:
//! 1. Creates a fresh signal slot
//! 2. Hands the step a [`Completion`] and a context whose stop targets that slot
//! 3. Treats an `Err` from the step future, or a panic while building or
//!    polling it, as the step failing
//! 4. Waits for the first signal and decides whether to continue
//!
//! Terminal callbacks are not invoked here; the chain does that from the
//! returned result.

use crate::chain::signal::{self, StepSignal, StopHandle};
use crate::chain::{ChainContext, Completion, RunOutcome, Step};
use crate::fetcher::Fetcher;
use crate::ChainError;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Runs `steps` in order against `context`
///
/// # Returns
///
/// * `Ok(RunOutcome::Completed)` - Every step signaled continue
/// * `Ok(RunOutcome::Stopped)` - A step requested a graceful stop
/// * `Err(ChainError)` - A step failed; remaining steps were skipped
pub(crate) async fn dispatch<F: Fetcher>(
    steps: &[Step<F>],
    context: &ChainContext<F>,
) -> Result<RunOutcome, ChainError> {
    let total = steps.len();

    for (index, step) in steps.iter().enumerate() {
        tracing::debug!("Running step {}/{}", index + 1, total);

        let (slot, receiver) = signal::pair(index);
        let completion = Completion::new(slot.clone());
        let step_context = context.rebind(StopHandle::armed(slot.clone()));

        let ran = AssertUnwindSafe(async move { step(completion, step_context).await })
            .catch_unwind()
            .await;

        let failure = match ran {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!("Step {} panicked: {}", index, message);
                Some(ChainError::Panicked {
                    step: index,
                    message,
                })
            }
        };

        if let Some(error) = failure {
            if !slot.send(StepSignal::Fail(error)) {
                tracing::debug!("Step {} failed after signaling; ignored", index);
            }
        }
        slot.step_returned();

        // Only the step's own handles may keep the slot open past this point
        drop(slot);

        match receiver.await {
            Ok(StepSignal::Continue) => {}
            Ok(StepSignal::Stop) => {
                tracing::debug!("Step {} stopped the chain", index);
                return Ok(RunOutcome::Stopped);
            }
            Ok(StepSignal::Fail(error)) => {
                tracing::warn!("Step {} failed: {}", index, error);
                return Err(error);
            }
            Err(_) => {
                tracing::warn!("Step {} dropped its completion without signaling", index);
                return Err(ChainError::Abandoned { step: index });
            }
        }
    }

    Ok(RunOutcome::Completed)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
