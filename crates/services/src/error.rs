//! Shared error types for the services crate.

use thiserror::Error;

use backend::ApiError;
use exam_core::model::{OptionId, QuestionError, QuestionId};

/// Errors surfaced by the session runtime.
///
/// Refusals caused by the session's current status are not errors; they come
/// back as `Ignored` outcomes instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session has no questions")]
    EmptySession,
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
    #[error("option {option} does not belong to question {question}")]
    InvalidOption {
        question: QuestionId,
        option: OptionId,
    },
    #[error("{operation} did not complete in time")]
    Timeout { operation: &'static str },
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// True when the failure came from the network or the backend rather
    /// than from the request itself.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            SessionError::Timeout { .. } => true,
            SessionError::Api(err) => err.is_transient(),
            _ => false,
        }
    }
}
