use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("score ({score}) exceeds total points ({total_points})")]
    ScoreExceedsTotal { score: u32, total_points: u32 },
}

/// Per-question outcome inside a graded result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionResult {
    pub is_correct: bool,
    pub points_earned: u32,
    pub correct_answer: String,
    pub user_answer: String,
    pub feedback: Option<String>,
}

/// Terminal artifact of a completed session, computed by the remote service.
///
/// Produced once per session and idempotently re-fetchable afterwards.
/// `feedback` may contain hyperlinks; rendering is a presentation concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    score: u32,
    total_points: u32,
    feedback: String,
    question_results: Vec<QuestionResult>,
    duration_millis: i64,
}

impl TestResult {
    /// Rehydrate a result from the remote service.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::ScoreExceedsTotal` when the score is larger than
    /// the achievable total.
    pub fn from_parts(
        score: u32,
        total_points: u32,
        feedback: impl Into<String>,
        question_results: Vec<QuestionResult>,
        duration_millis: i64,
    ) -> Result<Self, ResultError> {
        if score > total_points {
            return Err(ResultError::ScoreExceedsTotal {
                score,
                total_points,
            });
        }

        Ok(Self {
            score,
            total_points,
            feedback: feedback.into(),
            question_results,
            duration_millis,
        })
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    #[must_use]
    pub fn question_results(&self) -> &[QuestionResult] {
        &self.question_results
    }

    #[must_use]
    pub fn duration_millis(&self) -> i64 {
        self.duration_millis
    }
}
