//! Scripted gateway double shared by the session engine tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;

use exam_core::model::{
    Answer, Question, QuestionId, QuestionKind, QuestionResult, Session, SessionId, TestId,
    TestResult, UserId,
};
use exam_core::time::fixed_now;

use crate::error::GatewayError;
use crate::gateway::SessionGateway;

pub(crate) fn build_question(id: &str, correct: usize) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("Question {id}"),
        QuestionKind::SingleChoice,
        vec!["a".into(), "b".into(), "c".into()],
        BTreeSet::from([correct]),
        1,
        Some(format!("Explanation for {id}")),
    )
    .unwrap()
}

pub(crate) fn sample_result(score: u32, total_points: u32) -> TestResult {
    let question_results = (0..total_points)
        .map(|i| QuestionResult {
            is_correct: i < score,
            points_earned: u32::from(i < score),
            correct_answer: "a".into(),
            user_answer: if i < score { "a".into() } else { "b".into() },
            feedback: None,
        })
        .collect();
    TestResult::from_parts(score, total_points, "graded", question_results, 60_000).unwrap()
}

/// Scripted in-memory stand-in for the remote testing service.
///
/// Mimics the real service's completion semantics: finalizing twice yields
/// the already-completed condition, and results exist only after
/// finalization.
#[derive(Default)]
pub(crate) struct FakeGateway {
    template: StdMutex<Option<(TestId, Vec<Question>)>>,
    sessions: StdMutex<HashMap<SessionId, Session>>,
    results: StdMutex<HashMap<SessionId, TestResult>>,
    completed: StdMutex<HashSet<SessionId>>,
    unreachable_sessions: StdMutex<HashSet<SessionId>>,
    saved_answers: StdMutex<Vec<(SessionId, Answer)>>,
    completion_calls: AtomicUsize,
    started: AtomicUsize,
    completion_delay_ms: AtomicU64,
    fail_next_completion: AtomicBool,
    always_conflict: AtomicBool,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Gateway that knows one session template for `start_session` calls.
    pub(crate) fn with_test(test_id: TestId, questions: Vec<Question>) -> Self {
        let gateway = Self::new();
        *gateway.template.lock().unwrap() = Some((test_id, questions));
        gateway
    }

    /// Gateway primed with a graded result for an existing session id.
    pub(crate) fn with_result(session_id: SessionId, result: TestResult) -> Self {
        let gateway = Self::new();
        gateway.results.lock().unwrap().insert(session_id, result);
        gateway
    }

    pub(crate) fn with_completion_delay_ms(self, millis: u64) -> Self {
        self.completion_delay_ms.store(millis, Ordering::SeqCst);
        self
    }

    pub(crate) fn completion_always_conflicts(self) -> Self {
        self.always_conflict.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn fail_next_completion(self) -> Self {
        self.fail_next_completion.store(true, Ordering::SeqCst);
        self
    }

    /// Register a session the gateway will serve from `get_session`.
    pub(crate) fn insert_session(&self, session: Session) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.session_id().clone(), session);
    }

    /// Prime the graded result for a session.
    pub(crate) fn insert_result(&self, session_id: SessionId, result: TestResult) {
        self.results.lock().unwrap().insert(session_id, result);
    }

    /// Make `get_session` fail for one session id.
    pub(crate) fn make_unreachable(&self, session_id: SessionId) {
        self.unreachable_sessions.lock().unwrap().insert(session_id);
    }

    pub(crate) fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn saved_answers(&self) -> Vec<(SessionId, Answer)> {
        self.saved_answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionGateway for FakeGateway {
    async fn start_session(
        &self,
        test_id: &TestId,
        _user_id: &UserId,
    ) -> Result<SessionId, GatewayError> {
        let template = self.template.lock().unwrap().clone();
        let Some((template_test_id, questions)) = template else {
            return Err(GatewayError::Status(reqwest::StatusCode::NOT_FOUND));
        };
        if &template_test_id != test_id {
            return Err(GatewayError::Status(reqwest::StatusCode::NOT_FOUND));
        }

        let number = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = SessionId::new(format!("{}-attempt-{number}", uuid::Uuid::new_v4()));
        let session = Session::new(
            session_id.clone(),
            template_test_id,
            None,
            questions,
            fixed_now(),
        )
        .map_err(|err| GatewayError::Malformed(err.to_string()))?;
        self.insert_session(session);
        Ok(session_id)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Session, GatewayError> {
        if self.unreachable_sessions.lock().unwrap().contains(session_id) {
            return Err(GatewayError::Status(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ));
        }
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or(GatewayError::Status(reqwest::StatusCode::NOT_FOUND))
    }

    async fn save_answer(
        &self,
        session_id: &SessionId,
        answer: &Answer,
    ) -> Result<(), GatewayError> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(session_id) {
            session
                .record_answer(answer.clone())
                .map_err(|err| GatewayError::Malformed(err.to_string()))?;
        }
        drop(sessions);
        self.saved_answers
            .lock()
            .unwrap()
            .push((session_id.clone(), answer.clone()));
        Ok(())
    }

    async fn request_completion(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.completion_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        if self.fail_next_completion.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Status(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ));
        }
        if self.always_conflict.load(Ordering::SeqCst) {
            return Err(GatewayError::AlreadyCompleted);
        }

        let mut completed = self.completed.lock().unwrap();
        if !completed.insert(session_id.clone()) {
            return Err(GatewayError::AlreadyCompleted);
        }
        Ok(())
    }

    async fn get_results(&self, session_id: &SessionId) -> Result<TestResult, GatewayError> {
        self.results
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or(GatewayError::Status(reqwest::StatusCode::NOT_FOUND))
    }
}
