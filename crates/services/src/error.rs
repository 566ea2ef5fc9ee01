//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{AnswerError, SessionDataError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors surfaced at the remote testing service boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The service reports this session was already finalized. The completion
    /// path reclassifies this as success; no other caller should.
    #[error("session already completed on the server")]
    AlreadyCompleted,
    #[error("answer was not accepted by the server")]
    Rejected,
    #[error("malformed server response: {0}")]
    Malformed(String),
    #[error("request failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the session engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is already finished")]
    AlreadyFinished,
    #[error("session is not ready for completion")]
    NotFinished,
    #[error("no answer drafted for the current question")]
    EmptyDraft,
    #[error("no question at the active cursor")]
    MissingQuestion,
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Data(#[from] SessionDataError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error("gateway base URL is not configured")]
    MissingGatewayConfig,
}
