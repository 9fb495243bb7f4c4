use chrono::{DateTime, Utc};

use crate::model::QuestionSet;
use crate::time::elapsed_secs;

/// A successful move between questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub from: usize,
    pub to: usize,
    /// 1-based number of the target question, as the backend addresses it.
    pub question_number: u32,
    /// Seconds credited to the question being left.
    pub time_on_previous: u64,
}

/// Tracks the current question and per-question visit/time accounting.
///
/// The time baseline is the instant the student arrived at the current
/// question, or the instant of their last selection on it, whichever is later.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: usize,
    numbers: Vec<u32>,
    visits: Vec<u32>,
    time_spent: Vec<u64>,
    baseline: DateTime<Utc>,
}

impl Navigator {
    /// Start at `start_index` (clamped into range), seeded with the server's counters.
    #[must_use]
    pub fn new(questions: &QuestionSet, start_index: usize, now: DateTime<Utc>) -> Self {
        let numbers = questions.iter().map(|q| q.number()).collect::<Vec<_>>();
        let visits = questions.iter().map(|q| q.visited_count()).collect();
        let time_spent = questions.iter().map(|q| q.time_spent_seconds()).collect();
        let current = start_index.min(numbers.len().saturating_sub(1));
        Self {
            current,
            numbers,
            visits,
            time_spent,
            baseline: now,
        }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.numbers.len()
    }

    #[must_use]
    pub fn can_go_previous(&self) -> bool {
        self.current > 0
    }

    #[must_use]
    pub fn can_go_next(&self) -> bool {
        self.current + 1 < self.total()
    }

    #[must_use]
    pub fn visited_count(&self, index: usize) -> u32 {
        self.visits.get(index).copied().unwrap_or(0)
    }

    /// Accumulated seconds on `index`, excluding the running stretch on the current question.
    #[must_use]
    pub fn time_spent(&self, index: usize) -> u64 {
        self.time_spent.get(index).copied().unwrap_or(0)
    }

    /// Total seconds across all questions, including the running stretch.
    #[must_use]
    pub fn total_time_spent(&self, now: DateTime<Utc>) -> u64 {
        self.time_spent.iter().sum::<u64>() + self.elapsed_on_current(now)
    }

    /// Seconds since the current baseline.
    #[must_use]
    pub fn elapsed_on_current(&self, now: DateTime<Utc>) -> u64 {
        elapsed_secs(self.baseline, now)
    }

    /// Close the running stretch on the current question and start a new one.
    ///
    /// Returns the seconds that were credited.
    pub fn reset_baseline(&mut self, now: DateTime<Utc>) -> u64 {
        let elapsed = self.elapsed_on_current(now);
        if let Some(slot) = self.time_spent.get_mut(self.current) {
            *slot += elapsed;
        }
        self.baseline = now;
        elapsed
    }

    /// Restart the running stretch without crediting it, e.g. after a pause.
    pub fn discard_elapsed(&mut self, now: DateTime<Utc>) {
        self.baseline = now;
    }

    /// Move to `index`. Out-of-range or same-question requests are no-ops.
    pub fn go_to(&mut self, index: usize, now: DateTime<Utc>) -> Option<Navigation> {
        if index >= self.total() || index == self.current {
            return None;
        }
        let from = self.current;
        let time_on_previous = self.reset_baseline(now);
        self.current = index;
        self.visits[index] = self.visits[index].saturating_add(1);

        Some(Navigation {
            from,
            to: index,
            question_number: self.numbers[index],
            time_on_previous,
        })
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> Option<Navigation> {
        self.go_to(self.current + 1, now)
    }

    pub fn previous(&mut self, now: DateTime<Utc>) -> Option<Navigation> {
        let index = self.current.checked_sub(1)?;
        self.go_to(index, now)
    }
}
