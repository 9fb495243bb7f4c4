use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use exam_core::countdown::Countdown;
use exam_core::model::TimerSnapshot;

/// Server-anchored countdown plus the one-shot time-up signal.
#[derive(Debug, Default)]
pub struct TimerSynchronizer {
    countdown: Mutex<Countdown>,
    time_up_claimed: AtomicBool,
}

impl TimerSynchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn countdown(&self) -> MutexGuard<'_, Countdown> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a fresh server reading.
    pub fn apply(&self, snapshot: &TimerSnapshot, now: DateTime<Utc>) {
        self.countdown()
            .apply_server(snapshot.time_remaining_seconds, now);
    }

    /// Claim the time-up signal. True for exactly one caller per session.
    pub fn claim_time_up(&self) -> bool {
        !self.time_up_claimed.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn time_up_claimed(&self) -> bool {
        self.time_up_claimed.load(Ordering::Acquire)
    }

    /// A poll failed: hold the displayed value.
    pub fn mark_failed(&self, now: DateTime<Utc>) {
        self.countdown().mark_stale(now);
    }

    pub fn freeze(&self, now: DateTime<Utc>) {
        self.countdown().freeze(now);
    }

    pub fn unfreeze(&self, now: DateTime<Utc>) {
        self.countdown().unfreeze(now);
    }

    pub fn stop(&self, now: DateTime<Utc>) {
        self.countdown().stop(now);
    }

    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        self.countdown().remaining(now)
    }

    #[must_use]
    pub fn server_remaining(&self) -> Option<u64> {
        self.countdown().server_remaining()
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        let countdown = self.countdown();
        countdown.is_paused() || countdown.is_stale()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use exam_core::model::SessionStatus;
    use exam_core::time::fixed_now;

    fn snapshot(remaining: u64) -> TimerSnapshot {
        TimerSnapshot {
            started_at: None,
            duration_minutes: 10,
            time_remaining_seconds: remaining,
            is_time_up: remaining == 0,
            status: SessionStatus::InProgress,
        }
    }

    #[test]
    fn time_up_is_claimed_once() {
        let timer = TimerSynchronizer::new();
        assert!(timer.claim_time_up());
        assert!(!timer.claim_time_up());
        assert!(timer.time_up_claimed());
    }

    #[test]
    fn failed_poll_holds_the_display() {
        let t0 = fixed_now();
        let timer = TimerSynchronizer::new();
        timer.apply(&snapshot(120), t0);
        timer.mark_failed(t0 + Duration::seconds(2));

        assert!(timer.is_frozen());
        assert_eq!(timer.remaining(t0 + Duration::seconds(50)), Some(118));
    }
}
