use std::collections::HashSet;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;
use tracing::{info, warn};

use exam_core::model::{SessionId, TestResult};
use storage::repository::ProgressRepository;

use crate::error::{GatewayError, SessionError};
use crate::gateway::SessionGateway;

/// Serializes session finalization so at most one completion request reaches
/// the remote service per session.
///
/// The server does not make completion idempotent: a second request for a
/// finalized session fails with an already-completed condition. This guard
/// synthesizes idempotency client-side by collapsing concurrent duplicates
/// under one lock and reclassifying the already-completed condition as
/// success.
///
/// The completed set lives for the process only. After a restart, a session
/// finalized server-side is caught by the already-completed branch instead;
/// the set is a fast path, never the source of truth.
pub struct CompletionCoordinator {
    gate: Mutex<()>,
    completed: StdMutex<HashSet<SessionId>>,
}

impl CompletionCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: Mutex::new(()),
            completed: StdMutex::new(HashSet::new()),
        }
    }

    fn is_completed(&self, session_id: &SessionId) -> bool {
        self.completed_set().contains(session_id)
    }

    fn mark_completed(&self, session_id: &SessionId) {
        self.completed_set().insert(session_id.clone());
    }

    fn completed_set(&self) -> std::sync::MutexGuard<'_, HashSet<SessionId>> {
        match self.completed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Finalize a session and fetch its result.
    ///
    /// Safe to call repeatedly and concurrently for the same session: every
    /// caller converges on the same result, and the remote completion request
    /// is issued at most once per finalization.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Gateway` for completion or result-fetch
    /// failures other than the already-completed condition, which is treated
    /// as success.
    pub async fn complete(
        &self,
        gateway: &dyn SessionGateway,
        progress: &dyn ProgressRepository,
        session_id: &SessionId,
    ) -> Result<TestResult, SessionError> {
        // Fast path: a session known to be finalized goes straight to the
        // result fetch.
        if !self.is_completed(session_id) {
            let _guard = self.gate.lock().await;
            // Re-check: a concurrent caller may have finalized the session
            // while this one waited for the lock.
            if !self.is_completed(session_id) {
                match gateway.request_completion(session_id).await {
                    Ok(()) => {
                        info!(session_id = %session_id, "session finalized");
                    }
                    Err(GatewayError::AlreadyCompleted) => {
                        // A prior request landed server-side without the
                        // client observing the response. Converge on the
                        // stored result.
                        info!(
                            session_id = %session_id,
                            "session was already finalized server-side"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
                self.mark_completed(session_id);
                if let Err(err) = progress.clear_session(session_id).await {
                    warn!(
                        session_id = %session_id,
                        error = %err,
                        "failed to clear local progress after completion"
                    );
                }
            }
        }

        let result = gateway.get_results(session_id).await?;
        Ok(result)
    }
}

impl Default for CompletionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use storage::repository::{InMemoryRepository, ProgressRecord};

    use crate::sessions::support::{FakeGateway, sample_result};
    use exam_core::time::fixed_now;

    fn fake() -> FakeGateway {
        FakeGateway::with_result(SessionId::new("s1"), sample_result(2, 3))
    }

    #[tokio::test]
    async fn sequential_completion_issues_one_request() {
        let gateway = fake();
        let progress = InMemoryRepository::new();
        let coordinator = CompletionCoordinator::new();
        let id = SessionId::new("s1");

        let first = coordinator.complete(&gateway, &progress, &id).await.unwrap();
        let second = coordinator.complete(&gateway, &progress, &id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.completion_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_completion_collapses_to_one_request() {
        let gateway = Arc::new(fake().with_completion_delay_ms(20));
        let progress = Arc::new(InMemoryRepository::new());
        let coordinator = Arc::new(CompletionCoordinator::new());
        let id = SessionId::new("s1");

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let gateway = Arc::clone(&gateway);
            let progress = Arc::clone(&progress);
            let coordinator = Arc::clone(&coordinator);
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                coordinator
                    .complete(gateway.as_ref(), progress.as_ref(), &id)
                    .await
            }));
        }

        let left = tasks.remove(0).await.unwrap().unwrap();
        let right = tasks.remove(0).await.unwrap().unwrap();

        assert_eq!(left, right);
        assert_eq!(gateway.completion_calls(), 1);
    }

    #[tokio::test]
    async fn already_completed_is_reclassified_as_success() {
        let gateway = FakeGateway::with_result(SessionId::new("s1"), sample_result(1, 1))
            .completion_always_conflicts();
        let progress = InMemoryRepository::new();
        let coordinator = CompletionCoordinator::new();
        let id = SessionId::new("s1");

        let result = coordinator.complete(&gateway, &progress, &id).await.unwrap();

        assert_eq!(result.score(), 1);
        assert_eq!(gateway.completion_calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_propagates_and_retry_succeeds() {
        let gateway = fake().fail_next_completion();
        let progress = InMemoryRepository::new();
        let coordinator = CompletionCoordinator::new();
        let id = SessionId::new("s1");

        let err = coordinator
            .complete(&gateway, &progress, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Gateway(_)));

        let result = coordinator.complete(&gateway, &progress, &id).await.unwrap();
        assert_eq!(result.score(), 2);
        assert_eq!(gateway.completion_calls(), 2);
    }

    #[tokio::test]
    async fn completion_clears_stored_progress() {
        let gateway = fake();
        let progress = InMemoryRepository::new();
        let id = SessionId::new("s1");

        progress.mark_incomplete(&id, fixed_now()).await.unwrap();
        progress
            .save_progress(
                &id,
                &ProgressRecord {
                    question_index: 2,
                    timestamp_millis: fixed_now().timestamp_millis(),
                    elapsed_millis: 9_000,
                },
            )
            .await
            .unwrap();

        let coordinator = CompletionCoordinator::new();
        coordinator.complete(&gateway, &progress, &id).await.unwrap();

        assert_eq!(progress.get_progress(&id).await.unwrap(), None);
        assert!(progress.incomplete_sessions().await.unwrap().is_empty());
    }
}
