//! Per-step completion and stop signals
//!
//! Every step gets a fresh slot holding a oneshot sender. The [`Completion`]
//! handed to the step and the [`StopHandle`] inside its context both point at
//! that slot; whichever fires first takes the sender, later signals find the
//! slot empty and are dropped.

use crate::ChainError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// What a step reports when it finishes
#[derive(Debug)]
pub enum StepSignal {
    /// Run the next step
    Continue,
    /// Halt the chain gracefully
    Stop,
    /// Halt the chain with an error
    Fail(ChainError),
}

/// Shared single-use sender for one step
#[derive(Debug, Clone)]
pub(crate) struct SignalSlot(Arc<Mutex<SlotState>>);

#[derive(Debug)]
struct SlotState {
    sender: Option<oneshot::Sender<StepSignal>>,
    step: usize,
    returned: bool,
    completion_dropped: bool,
}

impl SignalSlot {
    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers `signal` if nothing was delivered yet; returns whether it was
    pub(crate) fn send(&self, signal: StepSignal) -> bool {
        let sender = self.state().sender.take();
        deliver(sender, signal)
    }

    /// Marks the step's future as finished
    ///
    /// If the completion was already dropped without signaling, the step is
    /// failed as abandoned unless something else signaled first.
    pub(crate) fn step_returned(&self) {
        let mut state = self.state();
        state.returned = true;
        if state.completion_dropped {
            let step = state.step;
            let sender = state.sender.take();
            drop(state);
            deliver(sender, StepSignal::Fail(ChainError::Abandoned { step }));
        }
    }

    /// Records that the completion went away unsignaled
    ///
    /// Before the step returns a stop through the context may still win;
    /// afterwards nothing else can signal and the step is failed right away.
    fn completion_dropped(&self) {
        let mut state = self.state();
        if state.sender.is_none() {
            return;
        }
        if state.returned {
            let step = state.step;
            let sender = state.sender.take();
            drop(state);
            deliver(sender, StepSignal::Fail(ChainError::Abandoned { step }));
        } else {
            state.completion_dropped = true;
        }
    }
}

fn deliver(sender: Option<oneshot::Sender<StepSignal>>, signal: StepSignal) -> bool {
    match sender {
        Some(sender) => {
            // The receiver only goes away once the run is over
            let _ = sender.send(signal);
            true
        }
        None => false,
    }
}

/// Creates the slot for step `step` along with the dispatcher's receiving end
pub(crate) fn pair(step: usize) -> (SignalSlot, oneshot::Receiver<StepSignal>) {
    let (sender, receiver) = oneshot::channel();
    let state = SlotState {
        sender: Some(sender),
        step,
        returned: false,
        completion_dropped: false,
    };
    (SignalSlot(Arc::new(Mutex::new(state))), receiver)
}

/// Completion signal handed to a step
///
/// A step must consume its completion exactly once. Dropping it without
/// signaling fails the chain with [`ChainError::Abandoned`], unless the step
/// stops through its context before its future returns. This holds even when
/// the step keeps a clone of its context around.
#[derive(Debug)]
pub struct Completion {
    slot: SignalSlot,
}

impl Completion {
    pub(crate) fn new(slot: SignalSlot) -> Self {
        Self { slot }
    }

    /// Proceeds to the next step
    pub fn done(self) {
        self.signal(StepSignal::Continue);
    }

    /// Halts the chain gracefully
    pub fn stop(self) {
        self.signal(StepSignal::Stop);
    }

    /// Halts the chain with `error`
    pub fn fail(self, error: impl Into<ChainError>) {
        self.signal(StepSignal::Fail(error.into()));
    }

    pub fn signal(self, signal: StepSignal) {
        if !self.slot.send(signal) {
            tracing::debug!("Step already signaled; ignoring completion");
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.slot.completion_dropped();
    }
}

/// Stop capability exposed through [`ChainContext::stop`](crate::ChainContext::stop)
///
/// A disarmed handle does nothing. Handles kept past the step they were
/// issued for are inert because that step's slot is already spent.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    slot: Option<SignalSlot>,
}

impl StopHandle {
    pub(crate) fn armed(slot: SignalSlot) -> Self {
        Self { slot: Some(slot) }
    }

    pub(crate) fn disarmed() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    pub fn stop(&self) {
        if let Some(slot) = &self.slot {
            if !slot.send(StepSignal::Stop) {
                tracing::debug!("Step already signaled; ignoring stop");
            }
        }
    }
}
