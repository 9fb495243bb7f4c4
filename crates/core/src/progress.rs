use crate::answers::AnswerCache;
use crate::model::{ProgressSnapshot, QuestionSet};
use crate::navigation::Navigator;

/// Palette state of one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionState {
    NotVisited,
    Visited,
    Answered,
    MarkedForReview,
}

/// What the student confirms before a manual submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSummary {
    pub answered: usize,
    pub unanswered: usize,
    pub marked_for_review: usize,
    /// 1-based numbers of questions with no selection.
    pub unanswered_numbers: Vec<u32>,
    /// 1-based numbers of questions flagged for review.
    pub marked_numbers: Vec<u32>,
}

/// Recompute progress from the local cache.
#[must_use]
pub fn tally(questions: &QuestionSet, cache: &AnswerCache, time_spent_seconds: u64) -> ProgressSnapshot {
    let answered = questions.iter().filter(|q| cache.is_answered(q.id())).count();
    let marked = questions
        .iter()
        .filter(|q| cache.is_marked_for_review(q.id()))
        .count();
    ProgressSnapshot::from_counts(questions.len(), answered, marked, time_spent_seconds)
}

/// Review beats answered, answered beats visited.
#[must_use]
pub fn question_state(
    questions: &QuestionSet,
    cache: &AnswerCache,
    navigator: &Navigator,
    index: usize,
) -> QuestionState {
    let Some(question) = questions.get(index) else {
        return QuestionState::NotVisited;
    };
    if cache.is_marked_for_review(question.id()) {
        QuestionState::MarkedForReview
    } else if cache.is_answered(question.id()) {
        QuestionState::Answered
    } else if navigator.visited_count(index) > 0 || navigator.current() == index {
        QuestionState::Visited
    } else {
        QuestionState::NotVisited
    }
}

#[must_use]
pub fn submit_summary(questions: &QuestionSet, cache: &AnswerCache) -> SubmitSummary {
    let mut unanswered_numbers = Vec::new();
    let mut marked_numbers = Vec::new();
    for question in questions.iter() {
        if !cache.is_answered(question.id()) {
            unanswered_numbers.push(question.number());
        }
        if cache.is_marked_for_review(question.id()) {
            marked_numbers.push(question.number());
        }
    }
    SubmitSummary {
        answered: questions.len() - unanswered_numbers.len(),
        unanswered: unanswered_numbers.len(),
        marked_for_review: marked_numbers.len(),
        unanswered_numbers,
        marked_numbers,
    }
}
