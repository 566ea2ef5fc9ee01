use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::model::{Answer, Question, QuestionId, SessionId, TestId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionDataError {
    #[error("session has no questions")]
    NoQuestions,

    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),

    #[error("answer references unknown question {0}")]
    UnknownQuestion(QuestionId),
}

/// A single test attempt as reported by the remote service.
///
/// The question order is fixed once loaded and defines navigation order.
/// Answers hold at most one current entry per question; re-answering a
/// question replaces the stored answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    session_id: SessionId,
    test_id: TestId,
    title: Option<String>,
    questions: Vec<Question>,
    answers: HashMap<QuestionId, Answer>,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Build a fresh session with no answers recorded yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionDataError::NoQuestions` for an empty question list and
    /// `SessionDataError::DuplicateQuestion` when ids repeat.
    pub fn new(
        session_id: SessionId,
        test_id: TestId,
        title: Option<String>,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionDataError> {
        Self::from_parts(session_id, test_id, title, questions, Vec::new(), started_at)
    }

    /// Rehydrate a session together with answers already stored remotely.
    ///
    /// # Errors
    ///
    /// Returns `SessionDataError::UnknownQuestion` when an answer does not
    /// belong to any question, in addition to the `new` validations.
    pub fn from_parts(
        session_id: SessionId,
        test_id: TestId,
        title: Option<String>,
        questions: Vec<Question>,
        answers: Vec<Answer>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionDataError> {
        if questions.is_empty() {
            return Err(SessionDataError::NoQuestions);
        }

        let mut ids = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !ids.insert(question.id().clone()) {
                return Err(SessionDataError::DuplicateQuestion(question.id().clone()));
            }
        }

        let mut stored = HashMap::with_capacity(answers.len());
        for answer in answers {
            if !ids.contains(answer.question_id()) {
                return Err(SessionDataError::UnknownQuestion(answer.question_id().clone()));
            }
            stored.insert(answer.question_id().clone(), answer);
        }

        Ok(Self {
            session_id,
            test_id,
            title,
            questions,
            answers: stored,
            started_at,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    /// Test metadata title, when the service provides one.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &QuestionId) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Record an answer, replacing any previous answer to the same question.
    ///
    /// # Errors
    ///
    /// Returns `SessionDataError::UnknownQuestion` when the answer does not
    /// belong to any question in this session.
    pub fn record_answer(&mut self, answer: Answer) -> Result<(), SessionDataError> {
        let known = self
            .questions
            .iter()
            .any(|question| question.id() == answer.question_id());
        if !known {
            return Err(SessionDataError::UnknownQuestion(answer.question_id().clone()));
        }
        self.answers.insert(answer.question_id().clone(), answer);
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionKind;
    use crate::time::fixed_now;
    use std::collections::BTreeSet;

    fn build_question(id: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            QuestionKind::SingleChoice,
            vec!["a".into(), "b".into()],
            BTreeSet::from([0]),
            1,
            None,
        )
        .unwrap()
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let err = Session::new(
            SessionId::new("s1"),
            TestId::new("t1"),
            None,
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();

        assert_eq!(err, SessionDataError::NoQuestions);
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let err = Session::new(
            SessionId::new("s1"),
            TestId::new("t1"),
            None,
            vec![build_question("q1"), build_question("q1")],
            fixed_now(),
        )
        .unwrap_err();

        assert_eq!(err, SessionDataError::DuplicateQuestion(QuestionId::new("q1")));
    }

    #[test]
    fn answers_must_match_a_question() {
        let stray = Answer::choice(QuestionId::new("q9"), [0]).unwrap();
        let err = Session::from_parts(
            SessionId::new("s1"),
            TestId::new("t1"),
            None,
            vec![build_question("q1")],
            vec![stray],
            fixed_now(),
        )
        .unwrap_err();

        assert_eq!(err, SessionDataError::UnknownQuestion(QuestionId::new("q9")));
    }

    #[test]
    fn recording_overwrites_previous_answer() {
        let mut session = Session::new(
            SessionId::new("s1"),
            TestId::new("t1"),
            Some("Rust basics".into()),
            vec![build_question("q1")],
            fixed_now(),
        )
        .unwrap();

        session
            .record_answer(Answer::choice(QuestionId::new("q1"), [0]).unwrap())
            .unwrap();
        session
            .record_answer(Answer::choice(QuestionId::new("q1"), [1]).unwrap())
            .unwrap();

        assert_eq!(session.answered_count(), 1);
        let stored = session.answer_for(&QuestionId::new("q1")).unwrap();
        assert!(stored.selected_options().contains(&1));
    }

    #[test]
    fn unknown_answer_is_rejected_on_record() {
        let mut session = Session::new(
            SessionId::new("s1"),
            TestId::new("t1"),
            None,
            vec![build_question("q1")],
            fixed_now(),
        )
        .unwrap();

        let err = session
            .record_answer(Answer::choice(QuestionId::new("q2"), [0]).unwrap())
            .unwrap_err();
        assert_eq!(err, SessionDataError::UnknownQuestion(QuestionId::new("q2")));
    }
}
