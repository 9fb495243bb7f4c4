use chrono::{DateTime, Utc};

use crate::model::{OptionId, QuestionId};

/// The server's record of an answer.
///
/// `is_correct`, `marks_awarded` and `answered_at` are computed by the
/// backend only; the client never derives them and never sends them back.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected_option: Option<OptionId>,
    pub is_marked_for_review: bool,
    pub time_spent_seconds: u64,
    pub is_correct: Option<bool>,
    pub marks_awarded: Option<f64>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl Answer {
    /// An answer with no server-computed fields, as a client would describe it.
    #[must_use]
    pub fn unscored(
        question_id: QuestionId,
        selected_option: Option<OptionId>,
        time_spent_seconds: u64,
    ) -> Self {
        Self {
            question_id,
            selected_option,
            is_marked_for_review: false,
            time_spent_seconds,
            is_correct: None,
            marks_awarded: None,
            answered_at: None,
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected_option.is_some()
    }
}
