use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("no option selected")]
    EmptySelection,

    #[error("answer text is blank")]
    BlankText,
}

/// A user's response to one question.
///
/// Exactly one shape is meaningful per question kind: a selection set for
/// choice questions, free text, or code. An answer is immutable once built;
/// re-answering a question replaces the stored answer wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    question_id: QuestionId,
    selected_options: BTreeSet<usize>,
    text_answer: Option<String>,
    code_answer: Option<String>,
}

impl Answer {
    /// Build a choice answer from the selected option indices.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::EmptySelection` when no index is given.
    pub fn choice(
        question_id: QuestionId,
        selected: impl IntoIterator<Item = usize>,
    ) -> Result<Self, AnswerError> {
        let selected_options: BTreeSet<usize> = selected.into_iter().collect();
        if selected_options.is_empty() {
            return Err(AnswerError::EmptySelection);
        }
        Ok(Self {
            question_id,
            selected_options,
            text_answer: None,
            code_answer: None,
        })
    }

    /// Build a free-text answer.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::BlankText` when the text is empty or whitespace.
    pub fn text(question_id: QuestionId, text: impl Into<String>) -> Result<Self, AnswerError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AnswerError::BlankText);
        }
        Ok(Self {
            question_id,
            selected_options: BTreeSet::new(),
            text_answer: Some(text),
            code_answer: None,
        })
    }

    /// Build a code answer.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::BlankText` when the code is empty or whitespace.
    pub fn code(question_id: QuestionId, code: impl Into<String>) -> Result<Self, AnswerError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(AnswerError::BlankText);
        }
        Ok(Self {
            question_id,
            selected_options: BTreeSet::new(),
            text_answer: None,
            code_answer: Some(code),
        })
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn selected_options(&self) -> &BTreeSet<usize> {
        &self.selected_options
    }

    #[must_use]
    pub fn text_answer(&self) -> Option<&str> {
        self.text_answer.as_deref()
    }

    #[must_use]
    pub fn code_answer(&self) -> Option<&str> {
        self.code_answer.as_deref()
    }

    /// Lowest selected option index.
    ///
    /// The remote save-answer contract carries a single index, so multi-select
    /// answers are narrowed to this value at the gateway boundary. The full
    /// selection set stays intact in local session state.
    #[must_use]
    pub fn first_selected(&self) -> Option<usize> {
        self.selected_options.iter().next().copied()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_answer_keeps_full_selection() {
        let answer = Answer::choice(QuestionId::new("q1"), [2, 0, 1]).unwrap();
        assert_eq!(answer.selected_options().len(), 3);
        assert_eq!(answer.first_selected(), Some(0));
        assert!(answer.text_answer().is_none());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = Answer::choice(QuestionId::new("q1"), []).unwrap_err();
        assert_eq!(err, AnswerError::EmptySelection);
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = Answer::text(QuestionId::new("q1"), "  ").unwrap_err();
        assert_eq!(err, AnswerError::BlankText);
    }

    #[test]
    fn code_answer_has_no_selection() {
        let answer = Answer::code(QuestionId::new("q1"), "fn main() {}").unwrap();
        assert!(answer.selected_options().is_empty());
        assert_eq!(answer.first_selected(), None);
        assert_eq!(answer.code_answer(), Some("fn main() {}"));
    }
}
