mod http;

pub use http::{GatewayConfig, HttpSessionGateway};

use async_trait::async_trait;

use exam_core::model::{Answer, Session, SessionId, TestId, TestResult, UserId};

use crate::error::GatewayError;

/// Narrow boundary to the remote testing service.
///
/// `request_completion` is not idempotent on the server: finalizing an
/// already-finalized session fails with [`GatewayError::AlreadyCompleted`]
/// instead of succeeding silently. The session engine compensates
/// client-side.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Start a new attempt at the given test and return its session id.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or protocol failures.
    async fn start_session(
        &self,
        test_id: &TestId,
        user_id: &UserId,
    ) -> Result<SessionId, GatewayError>;

    /// Fetch a session's current state, including answers already stored
    /// remotely.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Malformed` when the payload violates session
    /// invariants (e.g. an empty question list).
    async fn get_session(&self, session_id: &SessionId) -> Result<Session, GatewayError>;

    /// Store one answer. The wire request carries at most a single selected
    /// option index; multi-select answers are narrowed to their first
    /// selected index at this boundary (see [`Answer::first_selected`]).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` when the server nacks the answer.
    async fn save_answer(
        &self,
        session_id: &SessionId,
        answer: &Answer,
    ) -> Result<(), GatewayError>;

    /// Ask the server to finalize the session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::AlreadyCompleted` when the session was
    /// finalized before this call.
    async fn request_completion(&self, session_id: &SessionId) -> Result<(), GatewayError>;

    /// Fetch the graded result of a completed session. Safe to call any
    /// number of times.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or protocol failures.
    async fn get_results(&self, session_id: &SessionId) -> Result<TestResult, GatewayError>;
}
