//! End-to-end walk through a three-question attempt: answer, explanation,
//! completion, and cleared local bookkeeping.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use exam_core::model::{
    Answer, Question, QuestionId, QuestionKind, QuestionResult, Session, SessionId, TestId,
    TestResult, UserId,
};
use exam_core::time::{fixed_clock, fixed_now};
use services::{AppServices, GatewayError, SessionGateway, SessionPhase};
use storage::repository::{InMemoryRepository, ProgressRepository};

/// Scripted remote service for the smoke flow: one known test, completion
/// succeeds exactly once, results exist only after completion.
#[derive(Default)]
struct ScriptedGateway {
    sessions: Mutex<HashMap<SessionId, Session>>,
    completed: Mutex<HashSet<SessionId>>,
    started: AtomicUsize,
    completion_calls: AtomicUsize,
}

fn question(id: &str, correct: usize, explanation: &str) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("Question {id}"),
        QuestionKind::SingleChoice,
        vec!["a".into(), "b".into(), "c".into()],
        BTreeSet::from([correct]),
        1,
        Some(explanation.into()),
    )
    .unwrap()
}

fn test_questions() -> Vec<Question> {
    vec![
        question("q1", 0, "First explanation"),
        question("q2", 1, "Second explanation"),
        question("q3", 2, "Third explanation"),
    ]
}

#[async_trait]
impl SessionGateway for ScriptedGateway {
    async fn start_session(
        &self,
        test_id: &TestId,
        _user_id: &UserId,
    ) -> Result<SessionId, GatewayError> {
        if test_id != &TestId::new("T1") {
            return Err(GatewayError::Status(reqwest::StatusCode::NOT_FOUND));
        }
        let number = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = SessionId::new(format!("T1-attempt-{number}"));
        let session = Session::new(
            session_id.clone(),
            test_id.clone(),
            Some("Smoke Test".into()),
            test_questions(),
            fixed_now(),
        )
        .map_err(|err| GatewayError::Malformed(err.to_string()))?;
        self.sessions.lock().unwrap().insert(session_id.clone(), session);
        Ok(session_id)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Session, GatewayError> {
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
        let session = sessions
            .get_mut(session_id)
            .ok_or(GatewayError::Status(reqwest::StatusCode::NOT_FOUND))?;
        session
            .record_answer(answer.clone())
            .map_err(|err| GatewayError::Malformed(err.to_string()))
    }

    async fn request_completion(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        let mut completed = self.completed.lock().unwrap();
        if !completed.insert(session_id.clone()) {
            return Err(GatewayError::AlreadyCompleted);
        }
        Ok(())
    }

    async fn get_results(&self, session_id: &SessionId) -> Result<TestResult, GatewayError> {
        if !self.completed.lock().unwrap().contains(session_id) {
            return Err(GatewayError::Status(reqwest::StatusCode::NOT_FOUND));
        }
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or(GatewayError::Status(reqwest::StatusCode::NOT_FOUND))?;

        let question_results = session
            .questions()
            .iter()
            .map(|question| {
                let user = session.answer_for(question.id());
                let is_correct = user
                    .map(|answer| answer.selected_options() == question.correct_options())
                    .unwrap_or(false);
                QuestionResult {
                    is_correct,
                    points_earned: u32::from(is_correct),
                    correct_answer: "scripted".into(),
                    user_answer: "scripted".into(),
                    feedback: None,
                }
            })
            .collect::<Vec<_>>();
        let score = question_results
            .iter()
            .map(|entry| entry.points_earned)
            .sum();

        TestResult::from_parts(score, 3, "smoke feedback", question_results, 120_000)
            .map_err(|err| GatewayError::Malformed(err.to_string()))
    }
}

#[tokio::test]
async fn three_question_flow_grades_and_clears_bookkeeping() {
    let gateway = Arc::new(ScriptedGateway::default());
    let progress = Arc::new(InMemoryRepository::new());
    let app = AppServices::with_parts(
        fixed_clock(),
        Arc::clone(&gateway) as Arc<dyn SessionGateway>,
        Arc::clone(&progress) as Arc<dyn ProgressRepository>,
    );
    let loop_svc = app.session_loop();

    let mut session = loop_svc
        .start(&TestId::new("T1"), &UserId::new("u1"))
        .await
        .unwrap();
    let session_id = session.session_id().clone();
    assert_eq!(
        progress.incomplete_sessions().await.unwrap(),
        vec![session_id.clone()]
    );

    // Q1 answered correctly: advance, persist index 1.
    session.draft_mut().select_only(0);
    let outcome = loop_svc.submit_answer(&mut session).await.unwrap();
    assert!(outcome.locally_correct);
    assert_eq!(progress.get_progress(&session_id).await.unwrap(), Some(1));

    // Q2 answered incorrectly: explanation shown, cursor stays until
    // acknowledged, then persist index 2.
    session.draft_mut().select_only(0);
    let outcome = loop_svc.submit_answer(&mut session).await.unwrap();
    assert!(!outcome.locally_correct);
    assert_eq!(outcome.explanation.as_deref(), Some("Second explanation"));
    assert_eq!(session.cursor(), 1);
    assert_eq!(progress.get_progress(&session_id).await.unwrap(), Some(1));

    loop_svc.acknowledge_explanation(&mut session).await.unwrap();
    assert_eq!(session.cursor(), 2);
    assert_eq!(progress.get_progress(&session_id).await.unwrap(), Some(2));

    // Q3 answered correctly: triggers completion and grading.
    session.draft_mut().select_only(2);
    let outcome = loop_svc.submit_answer(&mut session).await.unwrap();
    let result = outcome.result.expect("graded result");

    assert_eq!(session.phase(), SessionPhase::Completed);
    assert_eq!(result.score(), 2);
    assert_eq!(result.total_points(), 3);
    assert_eq!(result.question_results().len(), 3);
    assert_eq!(gateway.completion_calls.load(Ordering::SeqCst), 1);

    // Local bookkeeping is gone.
    assert_eq!(progress.get_progress(&session_id).await.unwrap(), None);
    assert!(progress.incomplete_sessions().await.unwrap().is_empty());

    // Recovery no longer offers the finished attempt.
    let resumable = app
        .recovery()
        .find_resumable(&TestId::new("T1"))
        .await
        .unwrap();
    assert!(resumable.is_none());
}

#[tokio::test]
async fn interrupted_attempt_is_resumable_at_saved_index() {
    let gateway = Arc::new(ScriptedGateway::default());
    let progress = Arc::new(InMemoryRepository::new());
    let app = AppServices::with_parts(
        fixed_clock(),
        Arc::clone(&gateway) as Arc<dyn SessionGateway>,
        Arc::clone(&progress) as Arc<dyn ProgressRepository>,
    );
    let loop_svc = app.session_loop();

    let mut session = loop_svc
        .start(&TestId::new("T1"), &UserId::new("u1"))
        .await
        .unwrap();
    let session_id = session.session_id().clone();

    session.draft_mut().select_only(0);
    loop_svc.submit_answer(&mut session).await.unwrap();
    drop(session); // simulated process death

    let resumable = app
        .recovery()
        .find_resumable(&TestId::new("T1"))
        .await
        .unwrap()
        .expect("resumable attempt");
    assert_eq!(resumable.session.session_id(), &session_id);
    assert_eq!(resumable.question_index, 1);

    let resumed = loop_svc.resume(&session_id).await.unwrap();
    assert_eq!(resumed.cursor(), 1);
    // The first answer came back from the service with the session.
    assert_eq!(resumed.session().answered_count(), 1);
}
