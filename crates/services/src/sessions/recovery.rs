use std::sync::Arc;

use tracing::{info, warn};

use exam_core::model::{Session, SessionId, TestId};
use storage::repository::ProgressRepository;

use crate::error::SessionError;
use crate::gateway::SessionGateway;

/// An unfinished attempt a user can pick up instead of starting over.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumableSession {
    pub session: Session,
    pub question_index: u32,
}

/// Scans the incomplete-session set for attempts matching a test.
pub struct RecoveryService {
    gateway: Arc<dyn SessionGateway>,
    progress: Arc<dyn ProgressRepository>,
}

impl RecoveryService {
    #[must_use]
    pub fn new(gateway: Arc<dyn SessionGateway>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { gateway, progress }
    }

    /// Find the most recently marked unfinished attempt at the given test.
    ///
    /// The scan is best-effort per candidate: a session whose fetch fails is
    /// skipped, never aborting the scan of the rest. Sessions belonging to
    /// other tests are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the incomplete set itself cannot
    /// be read.
    pub async fn find_resumable(
        &self,
        test_id: &TestId,
    ) -> Result<Option<ResumableSession>, SessionError> {
        let candidates = self.progress.incomplete_sessions().await?;

        for session_id in candidates {
            let session = match self.gateway.get_session(&session_id).await {
                Ok(session) => session,
                Err(err) => {
                    warn!(
                        session_id = %session_id,
                        error = %err,
                        "skipping incomplete session that could not be fetched"
                    );
                    continue;
                }
            };

            if session.test_id() != test_id {
                continue;
            }

            let question_index = match self.progress.get_progress(&session_id).await {
                Ok(index) => index.unwrap_or(0),
                Err(err) => {
                    warn!(
                        session_id = %session_id,
                        error = %err,
                        "failed to read saved progress for resumable session"
                    );
                    0
                }
            };

            info!(
                session_id = %session_id,
                test_id = %test_id,
                question_index,
                "found resumable session"
            );
            return Ok(Some(ResumableSession {
                session,
                question_index,
            }));
        }

        Ok(None)
    }

    /// Drop an unfinished attempt before starting a fresh one, so the two
    /// never collide under the same bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the local records cannot be
    /// removed.
    pub async fn discard(&self, session_id: &SessionId) -> Result<(), SessionError> {
        self.progress.clear_session(session_id).await?;
        info!(session_id = %session_id, "discarded unfinished session");
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use exam_core::model::Session;
    use exam_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, ProgressRecord, ProgressRepository};

    use crate::sessions::support::{FakeGateway, build_question};

    fn remote_session(session_id: &str, test_id: &str) -> Session {
        Session::new(
            SessionId::new(session_id),
            TestId::new(test_id),
            None,
            vec![build_question("q0", 0), build_question("q1", 0)],
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn only_sessions_of_the_requested_test_match() {
        let gateway = Arc::new(FakeGateway::new());
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        let now = fixed_now();

        gateway.insert_session(remote_session("s-other", "t2"));
        gateway.insert_session(remote_session("s-match", "t1"));
        progress
            .mark_incomplete(&SessionId::new("s-other"), now + Duration::minutes(5))
            .await
            .unwrap();
        progress
            .mark_incomplete(&SessionId::new("s-match"), now)
            .await
            .unwrap();

        let recovery = RecoveryService::new(gateway, Arc::clone(&progress));
        let found = recovery
            .find_resumable(&TestId::new("t1"))
            .await
            .unwrap()
            .expect("resumable session");

        assert_eq!(found.session.session_id(), &SessionId::new("s-match"));
        assert_eq!(found.question_index, 0);

        let none = recovery.find_resumable(&TestId::new("t9")).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn most_recently_marked_session_wins() {
        let gateway = Arc::new(FakeGateway::new());
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        let now = fixed_now();

        gateway.insert_session(remote_session("s-old", "t1"));
        gateway.insert_session(remote_session("s-new", "t1"));
        progress
            .mark_incomplete(&SessionId::new("s-old"), now)
            .await
            .unwrap();
        progress
            .mark_incomplete(&SessionId::new("s-new"), now + Duration::minutes(1))
            .await
            .unwrap();
        progress
            .save_progress(
                &SessionId::new("s-new"),
                &ProgressRecord {
                    question_index: 1,
                    timestamp_millis: now.timestamp_millis(),
                    elapsed_millis: 12_000,
                },
            )
            .await
            .unwrap();

        let recovery = RecoveryService::new(gateway, Arc::clone(&progress));
        let found = recovery
            .find_resumable(&TestId::new("t1"))
            .await
            .unwrap()
            .expect("resumable session");

        assert_eq!(found.session.session_id(), &SessionId::new("s-new"));
        assert_eq!(found.question_index, 1);
    }

    #[tokio::test]
    async fn unreachable_candidates_are_skipped() {
        let gateway = Arc::new(FakeGateway::new());
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        let now = fixed_now();

        gateway.insert_session(remote_session("s-reachable", "t1"));
        gateway.make_unreachable(SessionId::new("s-broken"));
        progress
            .mark_incomplete(&SessionId::new("s-broken"), now + Duration::minutes(1))
            .await
            .unwrap();
        progress
            .mark_incomplete(&SessionId::new("s-reachable"), now)
            .await
            .unwrap();

        let recovery = RecoveryService::new(gateway, Arc::clone(&progress));
        let found = recovery
            .find_resumable(&TestId::new("t1"))
            .await
            .unwrap()
            .expect("resumable session");

        assert_eq!(found.session.session_id(), &SessionId::new("s-reachable"));
    }

    #[tokio::test]
    async fn discard_clears_local_bookkeeping() {
        let gateway = Arc::new(FakeGateway::new());
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        let id = SessionId::new("s1");

        progress.mark_incomplete(&id, fixed_now()).await.unwrap();
        progress
            .save_progress(
                &id,
                &ProgressRecord {
                    question_index: 1,
                    timestamp_millis: fixed_now().timestamp_millis(),
                    elapsed_millis: 5_000,
                },
            )
            .await
            .unwrap();

        let recovery = RecoveryService::new(gateway, Arc::clone(&progress));
        recovery.discard(&id).await.unwrap();

        assert!(progress.incomplete_sessions().await.unwrap().is_empty());
        assert_eq!(progress.get_progress(&id).await.unwrap(), None);
    }
}
