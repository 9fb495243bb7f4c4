use chrono::{DateTime, Utc};

use crate::time::elapsed_secs;

/// Locally ticking, advisory display of the remaining time.
///
/// Anchored on the last server reading and extrapolated downward from it.
/// The displayed value never rises except through a fresh server reading,
/// never exceeds the last server reading, and never goes below zero.
/// Reaching zero here is not a time-up signal.
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    server_remaining: Option<u64>,
    displayed: u64,
    anchor: DateTime<Utc>,
    paused: bool,
    stale: bool,
    stopped: bool,
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value reported by the server, if any.
    #[must_use]
    pub fn server_remaining(&self) -> Option<u64> {
        self.server_remaining
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.server_remaining.is_some() && !self.paused && !self.stale && !self.stopped
    }

    /// Frozen by a pending or confirmed pause.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Frozen because the last timer poll failed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Remaining seconds to display at `now`, or `None` before the first reading.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        self.server_remaining?;
        if self.is_running() {
            Some(self.displayed.saturating_sub(elapsed_secs(self.anchor, now)))
        } else {
            Some(self.displayed)
        }
    }

    /// Take a fresh server reading.
    ///
    /// While paused the reading is recorded but the display stays frozen,
    /// only ever lowered to respect the server ceiling. The first reading
    /// always sets the display.
    pub fn apply_server(&mut self, remaining: u64, now: DateTime<Utc>) {
        let first = self.server_remaining.replace(remaining).is_none();
        self.stale = false;
        if (self.paused || self.stopped) && !first {
            self.displayed = self.displayed.min(remaining);
        } else {
            self.displayed = remaining;
        }
        self.anchor = now;
    }

    /// A poll failed: hold the current value until the next successful one.
    pub fn mark_stale(&mut self, now: DateTime<Utc>) {
        self.capture(now);
        self.stale = true;
    }

    /// Freeze for a pause (requested or confirmed).
    pub fn freeze(&mut self, now: DateTime<Utc>) {
        self.capture(now);
        self.paused = true;
    }

    /// Continue ticking from the frozen value.
    pub fn unfreeze(&mut self, now: DateTime<Utc>) {
        if self.paused {
            self.paused = false;
            self.anchor = now;
        }
    }

    /// Stop for good once the session is terminal.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        self.capture(now);
        self.stopped = true;
    }

    fn capture(&mut self, now: DateTime<Utc>) {
        if let Some(value) = self.remaining(now) {
            self.displayed = value;
        }
        self.anchor = now;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::time::fixed_now;

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn nothing_to_display_before_first_reading() {
        assert_eq!(Countdown::new().remaining(fixed_now()), None);
    }

    #[test]
    fn extrapolates_down_and_clamps_at_zero() {
        let t0 = fixed_now();
        let mut countdown = Countdown::new();
        countdown.apply_server(10, t0);

        assert_eq!(countdown.remaining(t0 + secs(4)), Some(6));
        assert_eq!(countdown.remaining(t0 + secs(60)), Some(0));
    }

    #[test]
    fn never_exceeds_last_server_value() {
        let t0 = fixed_now();
        let mut countdown = Countdown::new();
        countdown.apply_server(100, t0);
        assert_eq!(countdown.remaining(t0 - secs(30)), Some(100));
    }

    #[test]
    fn failed_poll_freezes_display() {
        let t0 = fixed_now();
        let mut countdown = Countdown::new();
        countdown.apply_server(50, t0);
        countdown.mark_stale(t0 + secs(3));

        assert_eq!(countdown.remaining(t0 + secs(30)), Some(47));

        countdown.apply_server(40, t0 + secs(31));
        assert!(countdown.is_running());
        assert_eq!(countdown.remaining(t0 + secs(33)), Some(38));
    }

    #[test]
    fn pause_then_resume_continues_from_frozen_value() {
        let t0 = fixed_now();
        let mut countdown = Countdown::new();
        countdown.apply_server(600, t0);

        countdown.freeze(t0 + secs(10));
        assert_eq!(countdown.remaining(t0 + secs(500)), Some(590));

        countdown.unfreeze(t0 + secs(500));
        assert_eq!(countdown.remaining(t0 + secs(505)), Some(585));
    }

    #[test]
    fn reading_while_paused_only_lowers_display() {
        let t0 = fixed_now();
        let mut countdown = Countdown::new();
        countdown.apply_server(300, t0);
        countdown.freeze(t0 + secs(5));

        countdown.apply_server(600, t0 + secs(6));
        assert_eq!(countdown.remaining(t0 + secs(60)), Some(295));

        countdown.apply_server(200, t0 + secs(7));
        assert_eq!(countdown.remaining(t0 + secs(60)), Some(200));
    }

    #[test]
    fn first_reading_while_frozen_sets_the_display() {
        let t0 = fixed_now();
        let mut countdown = Countdown::new();
        countdown.freeze(t0);
        countdown.apply_server(600, t0 + secs(2));

        assert_eq!(countdown.remaining(t0 + secs(90)), Some(600));
        countdown.unfreeze(t0 + secs(100));
        assert_eq!(countdown.remaining(t0 + secs(110)), Some(590));
    }

    #[test]
    fn stopped_countdown_holds_its_value() {
        let t0 = fixed_now();
        let mut countdown = Countdown::new();
        countdown.apply_server(90, t0);
        countdown.stop(t0 + secs(30));

        assert!(!countdown.is_running());
        assert_eq!(countdown.remaining(t0 + secs(80)), Some(60));
    }
}
