use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    FreeText,
    Code,
}

impl QuestionKind {
    /// Choice kinds carry an option list; free-text and code prompts do not.
    #[must_use]
    pub fn has_options(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultipleChoice)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("choice question has no options")]
    NoOptions,

    #[error("option list on a question kind that takes none")]
    UnexpectedOptions,

    #[error("correct option index {index} out of range for {len} options")]
    CorrectOptionOutOfRange { index: usize, len: usize },
}

/// One prompt inside a test.
///
/// `correct_options` drives the advisory client-side correctness check only;
/// the remote service remains authoritative for grading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    kind: QuestionKind,
    options: Vec<String>,
    correct_options: BTreeSet<usize>,
    points: u32,
    explanation: Option<String>,
}

impl Question {
    /// Build a question, validating the shape against its kind.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the text is blank, a choice question has
    /// no options, a free-text/code question carries options, or a correct
    /// index falls outside the option list.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        kind: QuestionKind,
        options: Vec<String>,
        correct_options: BTreeSet<usize>,
        points: u32,
        explanation: Option<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }

        if kind.has_options() {
            if options.is_empty() {
                return Err(QuestionError::NoOptions);
            }
            if let Some(&index) = correct_options.iter().find(|&&i| i >= options.len()) {
                return Err(QuestionError::CorrectOptionOutOfRange {
                    index,
                    len: options.len(),
                });
            }
        } else if !options.is_empty() || !correct_options.is_empty() {
            return Err(QuestionError::UnexpectedOptions);
        }

        Ok(Self {
            id,
            text,
            kind,
            options,
            correct_options,
            points,
            explanation,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_options(&self) -> &BTreeSet<usize> {
        &self.correct_options
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Shown only when an answer is judged incorrect client-side.
    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
