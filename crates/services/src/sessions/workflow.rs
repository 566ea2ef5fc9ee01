use std::sync::Arc;

use tracing::{info, warn};

use exam_core::Clock;
use exam_core::judge::judge_locally;
use exam_core::model::{SessionId, TestId, TestResult, UserId};
use storage::repository::{ProgressRecord, ProgressRepository};

use crate::error::SessionError;
use crate::gateway::SessionGateway;

use super::completion::CompletionCoordinator;
use super::session::{SessionPhase, TestSession};

/// Result of submitting one answer.
///
/// `locally_correct` is advisory feedback only; code and free-text answers
/// always count as advance-worthy. `result` is set when the submission
/// finished the session.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub locally_correct: bool,
    pub advanced: bool,
    pub explanation: Option<String>,
    pub result: Option<TestResult>,
}

/// Drives the answer loop: start or resume an attempt, submit answers with
/// persisted progress, and finalize through the completion guard.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    gateway: Arc<dyn SessionGateway>,
    progress: Arc<dyn ProgressRepository>,
    coordinator: Arc<CompletionCoordinator>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        gateway: Arc<dyn SessionGateway>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            gateway,
            progress,
            coordinator: Arc::new(CompletionCoordinator::new()),
        }
    }

    /// Share a completion guard with other services holding the same
    /// gateway.
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<CompletionCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Start a fresh attempt at the given test.
    ///
    /// The session is marked incomplete before the first answer so a crash
    /// right after start is still discoverable by recovery.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Gateway` when the service cannot start or
    /// serve the session, including malformed session payloads.
    pub async fn start(
        &self,
        test_id: &TestId,
        user_id: &UserId,
    ) -> Result<TestSession, SessionError> {
        let session_id = self.gateway.start_session(test_id, user_id).await?;
        info!(session_id = %session_id, test_id = %test_id, "started test session");

        if let Err(err) = self
            .progress
            .mark_incomplete(&session_id, self.clock.now())
            .await
        {
            warn!(
                session_id = %session_id,
                error = %err,
                "failed to mark session incomplete"
            );
        }

        let session = self.gateway.get_session(&session_id).await?;
        Ok(TestSession::new(session, 0, 0, self.clock.now()))
    }

    /// Resume a previously started attempt at its furthest reached question.
    ///
    /// A failed progress read degrades to a restart from question 0; local
    /// persistence problems never block the flow.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Gateway` when the session cannot be fetched.
    pub async fn resume(&self, session_id: &SessionId) -> Result<TestSession, SessionError> {
        let session = self.gateway.get_session(session_id).await?;

        let saved_index = match self.progress.get_progress(session_id).await {
            Ok(index) => index.unwrap_or(0),
            Err(err) => {
                warn!(
                    session_id = %session_id,
                    error = %err,
                    "failed to read saved progress, resuming from the start"
                );
                0
            }
        };
        let elapsed = match self.progress.get_elapsed(session_id).await {
            Ok(elapsed) => elapsed.unwrap_or(0),
            Err(err) => {
                warn!(
                    session_id = %session_id,
                    error = %err,
                    "failed to read saved elapsed time"
                );
                0
            }
        };

        info!(session_id = %session_id, question_index = saved_index, "resumed test session");
        Ok(TestSession::new(
            session,
            saved_index,
            elapsed,
            self.clock.now(),
        ))
    }

    /// Submit the drafted answer for the current question.
    ///
    /// A locally correct answer (or one that is not locally verifiable)
    /// advances the cursor and persists the new position. A locally
    /// incorrect answer stays put and surfaces the explanation; advancing
    /// then goes through [`Self::acknowledge_explanation`]. Either way the
    /// answer has already been stored remotely.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyDraft` and answer-shape errors before any
    /// network call, and `SessionError::Gateway` when the save is rejected
    /// or fails in transit.
    pub async fn submit_answer(
        &self,
        session: &mut TestSession,
    ) -> Result<AnswerOutcome, SessionError> {
        if session.phase() != SessionPhase::Active {
            return Err(SessionError::AlreadyFinished);
        }
        let Some(question) = session.current_question().cloned() else {
            session.fail();
            return Err(SessionError::MissingQuestion);
        };

        let answer = session.draft().build(&question)?;
        self.gateway.save_answer(session.session_id(), &answer).await?;
        session.record_answer(answer.clone())?;

        let locally_correct = judge_locally(&question, &answer);
        if !locally_correct {
            return Ok(AnswerOutcome {
                locally_correct: false,
                advanced: false,
                explanation: question.explanation().map(ToOwned::to_owned),
                result: None,
            });
        }

        let result = self.advance(session).await?;
        Ok(AnswerOutcome {
            locally_correct: true,
            advanced: true,
            explanation: None,
            result,
        })
    }

    /// Advance past a question whose explanation was shown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyFinished` outside the active phase and
    /// completion errors when this acknowledgement finishes the session.
    pub async fn acknowledge_explanation(
        &self,
        session: &mut TestSession,
    ) -> Result<Option<TestResult>, SessionError> {
        if session.phase() != SessionPhase::Active {
            return Err(SessionError::AlreadyFinished);
        }
        self.advance(session).await
    }

    /// Finalize the session and fetch its graded result.
    ///
    /// Retryable: a failed attempt leaves the session in `Completing` and a
    /// repeat call re-enters the same guarded step.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` while questions remain, and
    /// gateway errors other than the already-completed condition.
    pub async fn complete(&self, session: &mut TestSession) -> Result<TestResult, SessionError> {
        match session.phase() {
            SessionPhase::Completed => {
                if let Some(result) = session.result() {
                    return Ok(result.clone());
                }
            }
            SessionPhase::Completing => {}
            SessionPhase::Active | SessionPhase::Failed => {
                return Err(SessionError::NotFinished);
            }
        }

        let result = self
            .coordinator
            .complete(
                self.gateway.as_ref(),
                self.progress.as_ref(),
                session.session_id(),
            )
            .await?;
        session.complete_with(result.clone());
        info!(
            session_id = %session.session_id(),
            score = result.score(),
            total_points = result.total_points(),
            "session completed"
        );
        Ok(result)
    }

    async fn advance(
        &self,
        session: &mut TestSession,
    ) -> Result<Option<TestResult>, SessionError> {
        session.advance();
        self.persist_progress(session).await;

        if session.phase() == SessionPhase::Completing {
            let result = self.complete(session).await?;
            return Ok(Some(result));
        }
        Ok(None)
    }

    async fn persist_progress(&self, session: &TestSession) {
        let now = self.clock.now();
        let record = ProgressRecord {
            question_index: session.resume_index(),
            timestamp_millis: now.timestamp_millis(),
            elapsed_millis: session.elapsed_millis(now),
        };
        // In-memory state stays authoritative for this run; a failed local
        // save only degrades resumability after a restart.
        if let Err(err) = self
            .progress
            .save_progress(session.session_id(), &record)
            .await
        {
            warn!(
                session_id = %session.session_id(),
                error = %err,
                "failed to persist session progress"
            );
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
