use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question number must be >= 1")]
    InvalidNumber,

    #[error("question {0} has no options")]
    NoOptions(QuestionId),

    #[error("question {question} lists option {option} twice")]
    DuplicateOption { question: QuestionId, option: OptionId },

    #[error("question {0} appears twice in the session")]
    DuplicateQuestion(QuestionId),

    #[error("question number {0} appears twice in the session")]
    DuplicateNumber(u32),

    #[error("session has no questions")]
    Empty,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDetail {
    pub id: QuestionId,
    pub text: String,
    pub image: Option<String>,
    pub difficulty: Difficulty,
    pub marks: f64,
    pub negative_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
    pub image: Option<String>,
    pub order: u32,
}

/// A question as it appears inside one session.
///
/// The detail and options never change once fetched. `visited_count` and
/// `time_spent_seconds` are the server's view at fetch time; the client keeps
/// its running counters in the navigator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionQuestion {
    number: u32,
    detail: QuestionDetail,
    options: Vec<QuestionOption>,
    visited_count: u32,
    time_spent_seconds: u64,
}

impl SessionQuestion {
    /// Build a validated question; options are sorted by their `order`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidNumber` for a zero question number,
    /// `QuestionError::NoOptions` for an empty option list, and
    /// `QuestionError::DuplicateOption` when an option id repeats.
    pub fn new(
        number: u32,
        detail: QuestionDetail,
        mut options: Vec<QuestionOption>,
        visited_count: u32,
        time_spent_seconds: u64,
    ) -> Result<Self, QuestionError> {
        if number == 0 {
            return Err(QuestionError::InvalidNumber);
        }
        if options.is_empty() {
            return Err(QuestionError::NoOptions(detail.id));
        }
        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if !seen.insert(option.id) {
                return Err(QuestionError::DuplicateOption {
                    question: detail.id,
                    option: option.id,
                });
            }
        }
        options.sort_by_key(|option| option.order);

        Ok(Self {
            number,
            detail,
            options,
            visited_count,
            time_spent_seconds,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.detail.id
    }

    /// 1-based position in the session.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn detail(&self) -> &QuestionDetail {
        &self.detail
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    /// Option shown at display position `index` (0-based).
    #[must_use]
    pub fn option_at(&self, index: usize) -> Option<&QuestionOption> {
        self.options.get(index)
    }

    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options.iter().any(|candidate| candidate.id == option)
    }

    #[must_use]
    pub fn visited_count(&self) -> u32 {
        self.visited_count
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// The immutable, ordered question list of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    questions: Vec<SessionQuestion>,
}

impl QuestionSet {
    /// Order questions by number and reject duplicates.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::Empty` for an empty list and the duplicate
    /// variants when a question id or number repeats.
    pub fn new(mut questions: Vec<SessionQuestion>) -> Result<Self, QuestionError> {
        if questions.is_empty() {
            return Err(QuestionError::Empty);
        }
        questions.sort_by_key(SessionQuestion::number);

        let mut ids = HashSet::with_capacity(questions.len());
        let mut last_number = None;
        for question in &questions {
            if !ids.insert(question.id()) {
                return Err(QuestionError::DuplicateQuestion(question.id()));
            }
            if last_number == Some(question.number()) {
                return Err(QuestionError::DuplicateNumber(question.number()));
            }
            last_number = Some(question.number());
        }

        Ok(Self { questions })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SessionQuestion> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn find(&self, id: QuestionId) -> Option<&SessionQuestion> {
        self.questions.iter().find(|question| question.id() == id)
    }

    #[must_use]
    pub fn index_of(&self, id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|question| question.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionQuestion> {
        self.questions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(id: QuestionId) -> QuestionDetail {
        QuestionDetail {
            id,
            text: "2 + 2?".into(),
            image: None,
            difficulty: Difficulty::Easy,
            marks: 1.0,
            negative_marks: 0.25,
        }
    }

    fn option(order: u32) -> QuestionOption {
        QuestionOption {
            id: OptionId::generate(),
            text: format!("option {order}"),
            image: None,
            order,
        }
    }

    #[test]
    fn options_are_sorted_by_order() {
        let question = SessionQuestion::new(
            1,
            detail(QuestionId::generate()),
            vec![option(3), option(1), option(2)],
            0,
            0,
        )
        .unwrap();
        let orders: Vec<u32> = question.options().iter().map(|o| o.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn foreign_option_is_not_part_of_question() {
        let question =
            SessionQuestion::new(1, detail(QuestionId::generate()), vec![option(1)], 0, 0).unwrap();
        assert!(!question.has_option(OptionId::generate()));
        assert!(question.has_option(question.options()[0].id));
    }

    #[test]
    fn duplicate_option_is_rejected() {
        let shared = option(1);
        let err = SessionQuestion::new(
            1,
            detail(QuestionId::generate()),
            vec![shared.clone(), shared],
            0,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateOption { .. }));
    }

    #[test]
    fn question_set_orders_by_number_and_rejects_repeats() {
        let q2 = SessionQuestion::new(2, detail(QuestionId::generate()), vec![option(1)], 0, 0)
            .unwrap();
        let q1 = SessionQuestion::new(1, detail(QuestionId::generate()), vec![option(1)], 0, 0)
            .unwrap();
        let set = QuestionSet::new(vec![q2.clone(), q1.clone()]).unwrap();
        assert_eq!(set.get(0).unwrap().number(), 1);
        assert_eq!(set.index_of(q2.id()), Some(1));

        let err = QuestionSet::new(vec![q1.clone(), q1]).unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateQuestion(_)));
    }
}
