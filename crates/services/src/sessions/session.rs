use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

use exam_core::model::{Answer, Question, QuestionKind, Session, TestId, SessionId, TestResult};

use crate::error::SessionError;

use super::progress::SessionProgress;

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of an attempt held in memory.
///
/// `Completing` is entered when the cursor moves past the last question and
/// is left only by a successful completion; a failed completion keeps the
/// session here so a retry re-enters the same step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Completing,
    Completed,
    Failed,
}

//
// ─── ANSWER DRAFT ──────────────────────────────────────────────────────────────
//

/// Mutable response being composed for the current question.
///
/// One shape is meaningful at a time; building validates the draft against
/// the question kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerDraft {
    selected: BTreeSet<usize>,
    text: Option<String>,
    code: Option<String>,
}

impl AnswerDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate a draft from a previously stored answer (revisits, resume).
    #[must_use]
    pub fn from_answer(answer: &Answer) -> Self {
        Self {
            selected: answer.selected_options().clone(),
            text: answer.text_answer().map(ToOwned::to_owned),
            code: answer.code_answer().map(ToOwned::to_owned),
        }
    }

    /// Toggle one option in a multi-select draft.
    pub fn toggle_option(&mut self, index: usize) {
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
    }

    /// Replace the selection with a single option (single-choice flows).
    pub fn select_only(&mut self, index: usize) {
        self.selected.clear();
        self.selected.insert(index);
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = Some(code.into());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.text.is_none() && self.code.is_none()
    }

    /// Build an immutable answer for the given question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyDraft` when the shape the question needs
    /// is missing, or an `AnswerError` for blank content.
    pub fn build(&self, question: &Question) -> Result<Answer, SessionError> {
        match question.kind() {
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice => {
                if self.selected.is_empty() {
                    return Err(SessionError::EmptyDraft);
                }
                Ok(Answer::choice(
                    question.id().clone(),
                    self.selected.iter().copied(),
                )?)
            }
            QuestionKind::FreeText => {
                let text = self.text.as_deref().ok_or(SessionError::EmptyDraft)?;
                Ok(Answer::text(question.id().clone(), text)?)
            }
            QuestionKind::Code => {
                let code = self.code.as_deref().ok_or(SessionError::EmptyDraft)?;
                Ok(Answer::code(question.id().clone(), code)?)
            }
        }
    }
}

//
// ─── TEST SESSION ──────────────────────────────────────────────────────────────
//

/// In-memory state machine for one attempt, driven by a single logical
/// caller.
///
/// The cursor tracks the question currently shown; `furthest` is the
/// high-water mark that resumption returns to. Backward navigation moves the
/// cursor only, never the high-water mark.
pub struct TestSession {
    session: Session,
    phase: SessionPhase,
    cursor: usize,
    furthest: usize,
    draft: AnswerDraft,
    elapsed_base_millis: i64,
    run_started_at: DateTime<Utc>,
    result: Option<TestResult>,
}

impl TestSession {
    /// Build the state machine over a fetched session.
    ///
    /// `saved_index` comes from the progress store (0 for a fresh start) and
    /// is clamped to the question range. `elapsed_base_millis` is the
    /// duration accumulated by earlier runs.
    #[must_use]
    pub fn new(
        session: Session,
        saved_index: u32,
        elapsed_base_millis: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let last = session.question_count().saturating_sub(1);
        let cursor = (saved_index as usize).min(last);
        let mut machine = Self {
            session,
            phase: SessionPhase::Active,
            cursor,
            furthest: cursor,
            draft: AnswerDraft::new(),
            elapsed_base_millis,
            run_started_at: now,
            result: None,
        };
        machine.hydrate_draft();
        machine
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.session.session_id()
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        self.session.test_id()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.session.question(self.cursor)
    }

    #[must_use]
    pub fn draft(&self) -> &AnswerDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut AnswerDraft {
        &mut self.draft
    }

    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    /// Index resumption should return to: the furthest question reached,
    /// clamped into the question range.
    #[must_use]
    pub fn resume_index(&self) -> u32 {
        let last = self.session.question_count().saturating_sub(1);
        u32::try_from(self.furthest.min(last)).unwrap_or(u32::MAX)
    }

    /// Active duration: persisted base plus time spent in this run.
    #[must_use]
    pub fn elapsed_millis(&self, now: DateTime<Utc>) -> i64 {
        let run = (now - self.run_started_at).num_milliseconds().max(0);
        self.elapsed_base_millis + run
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.session.question_count();
        let answered = self.session.answered_count();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            current_index: self.cursor,
            is_complete: self.is_complete(),
        }
    }

    /// Step back one question, rehydrating the draft from the stored answer.
    ///
    /// Pure cursor movement: the persisted high-water mark is untouched.
    pub fn previous(&mut self) {
        if self.phase == SessionPhase::Active && self.cursor > 0 {
            self.cursor -= 1;
            self.hydrate_draft();
        }
    }

    pub(crate) fn record_answer(&mut self, answer: Answer) -> Result<(), SessionError> {
        self.session.record_answer(answer)?;
        Ok(())
    }

    /// Move past the current question. Past the last question the session
    /// enters `Completing`.
    pub(crate) fn advance(&mut self) {
        self.cursor += 1;
        self.furthest = self.furthest.max(self.cursor);
        if self.cursor >= self.session.question_count() {
            self.phase = SessionPhase::Completing;
            self.draft.clear();
        } else {
            self.hydrate_draft();
        }
    }

    pub(crate) fn complete_with(&mut self, result: TestResult) {
        self.phase = SessionPhase::Completed;
        self.result = Some(result);
    }

    pub(crate) fn fail(&mut self) {
        self.phase = SessionPhase::Failed;
    }

    fn hydrate_draft(&mut self) {
        let stored = self
            .current_question()
            .and_then(|question| self.session.answer_for(question.id()))
            .map(AnswerDraft::from_answer);
        self.draft = stored.unwrap_or_default();
    }
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("session_id", self.session.session_id())
            .field("phase", &self.phase)
            .field("cursor", &self.cursor)
            .field("furthest", &self.furthest)
            .field("questions", &self.session.question_count())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
