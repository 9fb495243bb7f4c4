use async_trait::async_trait;
use thiserror::Error;

use exam_core::model::{
    Answer, ExamId, OptionId, ProgressSnapshot, QuestionId, ResultSummary, Session, SessionId,
    SessionQuestion, TimerSnapshot,
};

/// Errors surfaced by backend adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend answered `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The response did not match the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid api url: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Network-level failures that say nothing about the request itself.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Unavailable(_) | ApiError::Timeout => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Http(err) => err.is_connect(),
            _ => false,
        }
    }
}

/// Session plus score breakdown, available once a session is terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub session: Session,
    pub result: ResultSummary,
}

/// Operations the exam backend offers to a session runtime.
///
/// Every method is one round trip. Implementations parse and validate the
/// wire shape before returning domain types.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// Create a session for `exam`, optionally overriding its duration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend refuses or cannot be reached.
    async fn start_session(
        &self,
        exam: ExamId,
        custom_duration_minutes: Option<u32>,
    ) -> Result<Session, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport or decode failure.
    async fn get_questions(&self, session: SessionId) -> Result<Vec<SessionQuestion>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport or decode failure.
    async fn get_timer(&self, session: SessionId) -> Result<TimerSnapshot, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport or decode failure.
    async fn get_progress(&self, session: SessionId) -> Result<ProgressSnapshot, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport or decode failure.
    async fn get_answers(&self, session: SessionId) -> Result<Vec<Answer>, ApiError>;

    /// Record (or replace) the selection for `question`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the write is refused or fails in transit.
    async fn submit_answer(
        &self,
        session: SessionId,
        question: QuestionId,
        option: Option<OptionId>,
        time_spent_seconds: u64,
    ) -> Result<Answer, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the write is refused or fails in transit.
    async fn mark_for_review(&self, session: SessionId, question: QuestionId)
    -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the write is refused or fails in transit.
    async fn clear_review(&self, session: SessionId, question: QuestionId) -> Result<(), ApiError>;

    /// Tell the backend which question (1-based) is on screen.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the write is refused or fails in transit.
    async fn navigate_to_question(
        &self,
        session: SessionId,
        question_number: u32,
    ) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the transition is refused or fails in transit.
    async fn pause_session(&self, session: SessionId) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the transition is refused or fails in transit.
    async fn resume_session(&self, session: SessionId) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the transition is refused or fails in transit.
    async fn abandon_session(&self, session: SessionId) -> Result<(), ApiError>;

    /// Final submission. The backend scores the session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the submission is refused or fails in transit.
    async fn submit_exam(&self, session: SessionId) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the session has no report yet or on transport failure.
    async fn generate_report(&self, session: SessionId) -> Result<SessionReport, ApiError>;
}
