use std::sync::{Mutex, MutexGuard, PoisonError};

use exam_core::model::SubmitTrigger;
use exam_core::submission::{LatchState, SubmissionLatch};

/// Exactly-once gate for the final submission.
#[derive(Debug, Default)]
pub struct SubmissionCoordinator {
    latch: SubmissionLatch,
    trigger: Mutex<Option<SubmitTrigger>>,
}

impl SubmissionCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn trigger_slot(&self) -> MutexGuard<'_, Option<SubmitTrigger>> {
        self.trigger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> LatchState {
        self.latch.state()
    }

    /// Trigger of the submission currently in flight or completed.
    #[must_use]
    pub fn trigger(&self) -> Option<SubmitTrigger> {
        *self.trigger_slot()
    }

    /// Take the latch for `trigger`, or `None` if a submission is already
    /// in flight or done.
    pub fn try_begin(&self, trigger: SubmitTrigger) -> Option<SubmitPermit<'_>> {
        if !self.latch.try_acquire() {
            return None;
        }
        *self.trigger_slot() = Some(trigger);
        Some(SubmitPermit {
            coordinator: self,
            trigger,
            settled: false,
        })
    }

    /// Close the gate for good, e.g. when the server reports a terminal status.
    pub fn seal(&self) {
        self.latch.seal();
    }
}

/// Ownership of an in-flight submission.
///
/// Dropping it unsettled (a cancelled submit) returns the latch to idle.
#[derive(Debug)]
pub struct SubmitPermit<'a> {
    coordinator: &'a SubmissionCoordinator,
    trigger: SubmitTrigger,
    settled: bool,
}

impl SubmitPermit<'_> {
    #[must_use]
    pub fn trigger(&self) -> SubmitTrigger {
        self.trigger
    }

    pub fn complete(mut self) {
        self.settled = true;
        self.coordinator.latch.complete();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.release();
    }

    fn release(&self) {
        if self.coordinator.latch.release() {
            *self.coordinator.trigger_slot() = None;
        }
    }
}

impl Drop for SubmitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.release();
        }
    }
}
