mod dto;

use std::env;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use exam_core::model::{
    Answer, ExamId, OptionId, ProgressSnapshot, QuestionId, Session, SessionId, SessionQuestion,
    TimerSnapshot,
};

use crate::api::{ApiError, ExamApi, SessionReport};
use dto::{
    Ack, AnswerBody, AnswerRequest, AnswersBody, EmptyRequest, Envelope, ErrorBody,
    NavigateRequest, ProgressBody, QuestionRequest, QuestionsBody, ReportBody, SessionBody,
    StartRequest, TimerBody,
};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/exams/";

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl HttpConfig {
    /// Read `EXAM_API_URL` and `EXAM_API_TOKEN`.
    ///
    /// A blank token counts as absent.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("EXAM_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let token = env::var("EXAM_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Self { base_url, token }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            token: None,
        }
    }
}

/// `ExamApi` over the backend's REST endpoints.
#[derive(Clone)]
pub struct HttpExamApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpExamApi {
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` when the base URL does not parse.
    pub fn new(config: HttpConfig) -> Result<Self, ApiError> {
        Self::with_client(Client::new(), config)
    }

    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` when the base URL does not parse.
    pub fn with_client(client: Client, config: HttpConfig) -> Result<Self, ApiError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(raw));
        }
        Ok(Self {
            client,
            base,
            token: config.token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::InvalidUrl(err.to_string()))
    }

    fn session_path(session: SessionId, action: &str) -> String {
        format!("sessions/{session}/{action}/")
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!(%method, %url, "exam api request");

        let mut request = self.client.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Http(err)
            }
        })?;
        let response = Self::check_status(response).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        envelope.into_body()
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<EmptyRequest, T>(Method::GET, path, None).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body)).await
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn start_session(
        &self,
        exam: ExamId,
        custom_duration_minutes: Option<u32>,
    ) -> Result<Session, ApiError> {
        let body: SessionBody = self
            .post(
                &format!("exams/{exam}/start_exam/"),
                &StartRequest {
                    custom_duration: custom_duration_minutes,
                },
            )
            .await?;
        body.session.try_into()
    }

    async fn get_questions(&self, session: SessionId) -> Result<Vec<SessionQuestion>, ApiError> {
        let body: QuestionsBody = self.get(&Self::session_path(session, "questions")).await?;
        body.questions
            .into_iter()
            .map(SessionQuestion::try_from)
            .collect()
    }

    async fn get_timer(&self, session: SessionId) -> Result<TimerSnapshot, ApiError> {
        let body: TimerBody = self.get(&Self::session_path(session, "timer")).await?;
        body.timer.try_into()
    }

    async fn get_progress(&self, session: SessionId) -> Result<ProgressSnapshot, ApiError> {
        let body: ProgressBody = self.get(&Self::session_path(session, "progress")).await?;
        body.progress.try_into()
    }

    async fn get_answers(&self, session: SessionId) -> Result<Vec<Answer>, ApiError> {
        let body: AnswersBody = self.get(&Self::session_path(session, "answer")).await?;
        Ok(body.answers.into_iter().map(Answer::from).collect())
    }

    async fn submit_answer(
        &self,
        session: SessionId,
        question: QuestionId,
        option: Option<OptionId>,
        time_spent_seconds: u64,
    ) -> Result<Answer, ApiError> {
        let body: AnswerBody = self
            .post(
                &Self::session_path(session, "answer"),
                &AnswerRequest {
                    question_id: question,
                    selected_option_id: option,
                    time_spent_seconds,
                },
            )
            .await?;
        Ok(body.answer.into())
    }

    async fn mark_for_review(
        &self,
        session: SessionId,
        question: QuestionId,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .post(
                &Self::session_path(session, "mark_for_review"),
                &QuestionRequest {
                    question_id: question,
                },
            )
            .await?;
        Ok(())
    }

    async fn clear_review(&self, session: SessionId, question: QuestionId) -> Result<(), ApiError> {
        let _: Ack = self
            .post(
                &Self::session_path(session, "clear_review"),
                &QuestionRequest {
                    question_id: question,
                },
            )
            .await?;
        Ok(())
    }

    async fn navigate_to_question(
        &self,
        session: SessionId,
        question_number: u32,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .post(
                &Self::session_path(session, "navigate_to_question"),
                &NavigateRequest { question_number },
            )
            .await?;
        Ok(())
    }

    async fn pause_session(&self, session: SessionId) -> Result<(), ApiError> {
        let _: Ack = self
            .post(&Self::session_path(session, "pause"), &EmptyRequest {})
            .await?;
        Ok(())
    }

    async fn resume_session(&self, session: SessionId) -> Result<(), ApiError> {
        let _: Ack = self
            .post(&Self::session_path(session, "resume"), &EmptyRequest {})
            .await?;
        Ok(())
    }

    async fn abandon_session(&self, session: SessionId) -> Result<(), ApiError> {
        let _: Ack = self
            .post(&Self::session_path(session, "abandon"), &EmptyRequest {})
            .await?;
        Ok(())
    }

    async fn submit_exam(&self, session: SessionId) -> Result<(), ApiError> {
        let _: Ack = self
            .post(&Self::session_path(session, "submit_exam"), &EmptyRequest {})
            .await?;
        Ok(())
    }

    async fn generate_report(&self, session: SessionId) -> Result<SessionReport, ApiError> {
        let body: ReportBody = self
            .get(&Self::session_path(session, "generate_report"))
            .await?;
        body.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> HttpConfig {
        HttpConfig {
            base_url: base_url.into(),
            token: None,
        }
    }

    #[test]
    fn base_without_trailing_slash_keeps_its_last_segment() {
        let api = HttpExamApi::new(config("http://localhost:8000/api/exams")).unwrap();
        let session = SessionId::generate();
        let url = api
            .endpoint(&HttpExamApi::session_path(session, "timer"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            format!("http://localhost:8000/api/exams/sessions/{session}/timer/")
        );
    }

    #[test]
    fn start_endpoint_is_rooted_under_exams() {
        let api = HttpExamApi::new(HttpConfig::default()).unwrap();
        let exam = ExamId::generate();
        let url = api.endpoint(&format!("exams/{exam}/start_exam/")).unwrap();
        assert!(url.path().ends_with(&format!("/api/exams/exams/{exam}/start_exam/")));
    }

    #[test]
    fn garbage_base_url_is_rejected() {
        assert!(matches!(
            HttpExamApi::new(config("not a url")),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn optional_duration_is_omitted_from_the_body() {
        let body = serde_json::to_value(StartRequest {
            custom_duration: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({}));
    }
}
