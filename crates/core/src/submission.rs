use std::sync::atomic::{AtomicU8, Ordering};

/// Observable state of a [`SubmissionLatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    Idle,
    InFlight,
    Done,
}

const IDLE: u8 = 0;
const IN_FLIGHT: u8 = 1;
const DONE: u8 = 2;

/// Tri-state exactly-once gate for the final submission.
///
/// `try_acquire` is a single compare-and-swap, so two triggers racing from
/// different tasks or threads can never both win.
#[derive(Debug, Default)]
pub struct SubmissionLatch {
    state: AtomicU8,
}

impl SubmissionLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> LatchState {
        match self.state.load(Ordering::Acquire) {
            IDLE => LatchState::Idle,
            IN_FLIGHT => LatchState::InFlight,
            _ => LatchState::Done,
        }
    }

    /// `idle → in_flight`. Returns false (and changes nothing) from any other state.
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(IDLE, IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `in_flight → done` after a successful submit.
    pub fn complete(&self) -> bool {
        self.state
            .compare_exchange(IN_FLIGHT, DONE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `in_flight → idle` after a failed submit, so it can be retried.
    pub fn release(&self) -> bool {
        self.state
            .compare_exchange(IN_FLIGHT, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Force `done`, e.g. when the server reports the session already closed.
    pub fn seal(&self) {
        self.state.store(DONE, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn second_acquire_is_refused_while_in_flight() {
        let latch = SubmissionLatch::new();
        assert!(latch.try_acquire());
        assert!(!latch.try_acquire());
        assert_eq!(latch.state(), LatchState::InFlight);
    }

    #[test]
    fn failure_returns_to_idle_and_success_is_final() {
        let latch = SubmissionLatch::new();
        assert!(latch.try_acquire());
        assert!(latch.release());
        assert_eq!(latch.state(), LatchState::Idle);

        assert!(latch.try_acquire());
        assert!(latch.complete());
        assert!(!latch.try_acquire());
        assert!(!latch.release());
        assert_eq!(latch.state(), LatchState::Done);
    }

    #[test]
    fn only_one_thread_wins_the_race() {
        let latch = Arc::new(SubmissionLatch::new());
        let winners: usize = (0..16)
            .map(|_| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || latch.try_acquire())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| usize::from(handle.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }
}
