use chrono::{DateTime, Utc};

use crate::model::SessionStatus;

/// Canonical remaining-time reading from the backend.
///
/// This is the only authoritative time source; the local countdown merely
/// interpolates between two of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub started_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub time_remaining_seconds: u64,
    pub is_time_up: bool,
    pub status: SessionStatus,
}

impl TimerSnapshot {
    /// True when this reading obliges the client to auto-submit.
    #[must_use]
    pub fn signals_time_up(&self) -> bool {
        self.is_time_up && self.status == SessionStatus::InProgress
    }
}
