use std::sync::{Mutex, MutexGuard, PoisonError};

use exam_core::model::ProgressSnapshot;

/// Handle for one progress request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTicket(u64);

#[derive(Debug, Default)]
struct ProgressState {
    next_seq: u64,
    applied_seq: u64,
    server: Option<ProgressSnapshot>,
}

/// Keeps the newest server progress snapshot, dropping late responses.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    state: Mutex<ProgressState>,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) -> ProgressTicket {
        let mut state = self.state();
        state.next_seq += 1;
        ProgressTicket(state.next_seq)
    }

    /// Store `snapshot` unless a newer request has already been applied.
    pub fn apply(&self, ticket: ProgressTicket, snapshot: ProgressSnapshot) -> bool {
        let mut state = self.state();
        if ticket.0 <= state.applied_seq {
            return false;
        }
        state.applied_seq = ticket.0;
        state.server = Some(snapshot);
        true
    }

    #[must_use]
    pub fn server(&self) -> Option<ProgressSnapshot> {
        self.state().server.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_response_is_dropped() {
        let aggregator = ProgressAggregator::new();
        let first = aggregator.begin();
        let second = aggregator.begin();

        assert!(aggregator.apply(second, ProgressSnapshot::from_counts(5, 3, 0, 0)));
        assert!(!aggregator.apply(first, ProgressSnapshot::from_counts(5, 1, 0, 0)));
        assert_eq!(aggregator.server().unwrap().answered, 3);
    }
}
