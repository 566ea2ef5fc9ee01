//! Advisory client-side correctness check.
//!
//! Drives immediate UI feedback (advance vs. show explanation) and nothing
//! else. The remote service computes the authoritative score; the two must
//! never be conflated.

use crate::model::{Answer, Question, QuestionKind};

/// Judge an answer against the question's advisory correct set.
///
/// Free-text and code answers are not locally verifiable and always count as
/// advance-worthy.
#[must_use]
pub fn judge_locally(question: &Question, answer: &Answer) -> bool {
    match question.kind() {
        QuestionKind::SingleChoice | QuestionKind::MultipleChoice => {
            answer.selected_options() == question.correct_options()
        }
        QuestionKind::FreeText | QuestionKind::Code => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionId;
    use std::collections::BTreeSet;

    fn choice_question(kind: QuestionKind, correct: &[usize]) -> Question {
        Question::new(
            QuestionId::new("q1"),
            "Pick",
            kind,
            vec!["a".into(), "b".into(), "c".into()],
            correct.iter().copied().collect::<BTreeSet<_>>(),
            1,
            Some("explained".into()),
        )
        .unwrap()
    }

    #[test]
    fn single_choice_matches_exact_selection() {
        let question = choice_question(QuestionKind::SingleChoice, &[1]);
        let right = Answer::choice(QuestionId::new("q1"), [1]).unwrap();
        let wrong = Answer::choice(QuestionId::new("q1"), [0]).unwrap();

        assert!(judge_locally(&question, &right));
        assert!(!judge_locally(&question, &wrong));
    }

    #[test]
    fn multiple_choice_requires_full_set() {
        let question = choice_question(QuestionKind::MultipleChoice, &[0, 2]);
        let right = Answer::choice(QuestionId::new("q1"), [2, 0]).unwrap();
        let partial = Answer::choice(QuestionId::new("q1"), [0]).unwrap();
        let extra = Answer::choice(QuestionId::new("q1"), [0, 1, 2]).unwrap();

        assert!(judge_locally(&question, &right));
        assert!(!judge_locally(&question, &partial));
        assert!(!judge_locally(&question, &extra));
    }

    #[test]
    fn code_answers_always_advance() {
        let question = Question::new(
            QuestionId::new("q1"),
            "Implement",
            QuestionKind::Code,
            Vec::new(),
            BTreeSet::new(),
            5,
            None,
        )
        .unwrap();
        let answer = Answer::code(QuestionId::new("q1"), "let x = 1;").unwrap();

        assert!(judge_locally(&question, &answer));
    }

    #[test]
    fn free_text_always_advances() {
        let question = Question::new(
            QuestionId::new("q1"),
            "Describe",
            QuestionKind::FreeText,
            Vec::new(),
            BTreeSet::new(),
            2,
            None,
        )
        .unwrap();
        let answer = Answer::text(QuestionId::new("q1"), "because").unwrap();

        assert!(judge_locally(&question, &answer));
    }
}
