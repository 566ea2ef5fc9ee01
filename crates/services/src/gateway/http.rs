use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use exam_core::model::{
    Answer, Question, QuestionId, QuestionKind, QuestionResult, Session, SessionId, TestId,
    TestResult, UserId,
};

use crate::error::GatewayError;

use super::SessionGateway;

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("EXAM_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let auth_token = env::var("EXAM_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self {
            base_url,
            auth_token,
        })
    }
}

/// HTTP adapter for the remote testing service.
#[derive(Clone)]
pub struct HttpSessionGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpSessionGateway {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Status(status))
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn start_session(
        &self,
        test_id: &TestId,
        user_id: &UserId,
    ) -> Result<SessionId, GatewayError> {
        let payload = StartSessionRequest {
            test_id: test_id.as_str(),
            user_id: user_id.as_str(),
        };
        let response = self
            .authorize(self.client.post(self.url("v1/sessions")))
            .json(&payload)
            .send()
            .await?;
        let body: StartSessionResponse = check_status(response)?.json().await?;
        Ok(SessionId::new(body.session_id))
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Session, GatewayError> {
        let path = format!("v1/sessions/{session_id}");
        let response = self
            .authorize(self.client.get(self.url(&path)))
            .send()
            .await?;
        let body: SessionDto = check_status(response)?.json().await?;
        map_session(body)
    }

    async fn save_answer(
        &self,
        session_id: &SessionId,
        answer: &Answer,
    ) -> Result<(), GatewayError> {
        let path = format!("v1/sessions/{session_id}/answers");
        let payload = save_answer_request(answer);
        let response = self
            .authorize(self.client.post(self.url(&path)))
            .json(&payload)
            .send()
            .await?;
        let body: AckResponse = check_status(response)?.json().await?;
        if body.ack { Ok(()) } else { Err(GatewayError::Rejected) }
    }

    async fn request_completion(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        let path = format!("v1/sessions/{session_id}/complete");
        let response = self
            .authorize(self.client.post(self.url(&path)))
            .send()
            .await?;
        // The service signals an already-finalized session with 409.
        if response.status() == StatusCode::CONFLICT {
            return Err(GatewayError::AlreadyCompleted);
        }
        let body: AckResponse = check_status(response)?.json().await?;
        if body.ack { Ok(()) } else { Err(GatewayError::Rejected) }
    }

    async fn get_results(&self, session_id: &SessionId) -> Result<TestResult, GatewayError> {
        let path = format!("v1/sessions/{session_id}/results");
        let response = self
            .authorize(self.client.get(self.url(&path)))
            .send()
            .await?;
        let body: ResultDto = check_status(response)?.json().await?;
        map_result(body)
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct StartSessionRequest<'a> {
    test_id: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    session_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct SaveAnswerRequest<'a> {
    question_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_option: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    ack: bool,
}

#[derive(Debug, Deserialize)]
struct SessionDto {
    session_id: String,
    test_id: String,
    #[serde(default)]
    title: Option<String>,
    started_at: DateTime<Utc>,
    questions: Vec<QuestionDto>,
    #[serde(default)]
    answers: Vec<AnswerDto>,
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    id: String,
    text: String,
    kind: QuestionKind,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_options: Vec<usize>,
    points: u32,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnswerDto {
    question_id: String,
    #[serde(default)]
    selected_option: Option<usize>,
    #[serde(default)]
    text_answer: Option<String>,
    #[serde(default)]
    code_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultDto {
    score: u32,
    total_points: u32,
    #[serde(default)]
    feedback: String,
    question_results: Vec<QuestionResultDto>,
    duration_millis: i64,
}

#[derive(Debug, Deserialize)]
struct QuestionResultDto {
    is_correct: bool,
    points_earned: u32,
    correct_answer: String,
    user_answer: String,
    #[serde(default)]
    feedback: Option<String>,
}

//
// ─── MAPPING ───────────────────────────────────────────────────────────────────
//

/// Build the save-answer wire request, narrowing a multi-select answer to its
/// first selected index. Text and code content stays in local session state;
/// the wire contract does not carry it.
fn save_answer_request(answer: &Answer) -> SaveAnswerRequest<'_> {
    SaveAnswerRequest {
        question_id: answer.question_id().as_str(),
        selected_option: answer.first_selected(),
    }
}

fn map_session(dto: SessionDto) -> Result<Session, GatewayError> {
    let mut questions = Vec::with_capacity(dto.questions.len());
    for question in dto.questions {
        questions.push(map_question(question)?);
    }

    // Unanswered placeholders (no shape at all) are dropped, not errors.
    let answers = dto
        .answers
        .into_iter()
        .filter_map(map_answer)
        .collect::<Result<Vec<_>, _>>()?;

    Session::from_parts(
        SessionId::new(dto.session_id),
        TestId::new(dto.test_id),
        dto.title,
        questions,
        answers,
        dto.started_at,
    )
    .map_err(|err| GatewayError::Malformed(err.to_string()))
}

fn map_question(dto: QuestionDto) -> Result<Question, GatewayError> {
    Question::new(
        QuestionId::new(dto.id),
        dto.text,
        dto.kind,
        dto.options,
        dto.correct_options.into_iter().collect(),
        dto.points,
        dto.explanation,
    )
    .map_err(|err| GatewayError::Malformed(err.to_string()))
}

fn map_answer(dto: AnswerDto) -> Option<Result<Answer, GatewayError>> {
    let question_id = QuestionId::new(dto.question_id);
    let answer = if let Some(index) = dto.selected_option {
        Answer::choice(question_id, [index])
    } else if let Some(text) = dto.text_answer {
        Answer::text(question_id, text)
    } else if let Some(code) = dto.code_answer {
        Answer::code(question_id, code)
    } else {
        return None;
    };
    Some(answer.map_err(|err| GatewayError::Malformed(err.to_string())))
}

fn map_result(dto: ResultDto) -> Result<TestResult, GatewayError> {
    let question_results = dto
        .question_results
        .into_iter()
        .map(|entry| QuestionResult {
            is_correct: entry.is_correct,
            points_earned: entry.points_earned,
            correct_answer: entry.correct_answer,
            user_answer: entry.user_answer,
            feedback: entry.feedback,
        })
        .collect();

    TestResult::from_parts(
        dto.score,
        dto.total_points,
        dto.feedback,
        question_results,
        dto.duration_millis,
    )
    .map_err(|err| GatewayError::Malformed(err.to_string()))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
