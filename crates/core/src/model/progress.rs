/// Answered/unanswered/review counts for display and submit confirmation.
///
/// Always derived: either reported by the backend or recomputed locally from
/// the answer cache. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub total_questions: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub marked_for_review: usize,
    pub percentage_complete: f64,
    pub time_spent_seconds: u64,
}

impl ProgressSnapshot {
    /// Derive the remaining fields from raw counts.
    #[must_use]
    pub fn from_counts(
        total_questions: usize,
        answered: usize,
        marked_for_review: usize,
        time_spent_seconds: u64,
    ) -> Self {
        let answered = answered.min(total_questions);
        let percentage_complete = if total_questions == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let pct = answered as f64 / total_questions as f64 * 100.0;
            pct
        };
        Self {
            total_questions,
            answered,
            unanswered: total_questions - answered,
            marked_for_review,
            percentage_complete,
            time_spent_seconds,
        }
    }
}
