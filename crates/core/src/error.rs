use thiserror::Error;

use crate::model::{AnswerError, QuestionError, ResultError, SessionDataError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Session(#[from] SessionDataError),
    #[error(transparent)]
    Result(#[from] ResultError),
}
