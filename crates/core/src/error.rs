use thiserror::Error;

use crate::model::{QuestionError, SessionStatusError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Status(#[from] SessionStatusError),
}
