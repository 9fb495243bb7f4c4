//! Wire shapes of the exam REST API and their mapping into domain types.
//!
//! Responses are wrapped in `{ "success": bool, ... }` envelopes. Decimal
//! fields may arrive as JSON numbers or as strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use exam_core::model::{
    Answer, Difficulty, ExamId, OptionId, ProgressSnapshot, QuestionDetail, QuestionId,
    QuestionOption, ResultSummary, Session, SessionId, SessionQuestion, SessionStatus,
    TimerSnapshot,
};

use crate::api::{ApiError, SessionReport};

// ─── Envelope ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    pub(crate) fn into_body(self) -> Result<T, ApiError> {
        if self.success {
            Ok(self.body)
        } else {
            Err(ApiError::Rejected(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ))
        }
    }
}

/// Error body of a non-2xx response.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error.or(self.detail).or(self.message)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ack {}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionBody {
    pub session: SessionDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionsBody {
    pub questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimerBody {
    pub timer: TimerDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressBody {
    pub progress: ProgressDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswersBody {
    pub answers: Vec<AnswerDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerBody {
    pub answer: AnswerDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportBody {
    pub session: SessionDto,
    #[serde(default)]
    pub result: Option<ResultDto>,
}

// ─── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct StartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_duration: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerRequest {
    pub question_id: QuestionId,
    pub selected_option_id: Option<OptionId>,
    pub time_spent_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionRequest {
    pub question_id: QuestionId,
}

#[derive(Debug, Serialize)]
pub(crate) struct NavigateRequest {
    pub question_number: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmptyRequest {}

// ─── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct SessionDto {
    pub id: SessionId,
    pub exam: ExamId,
    pub status: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub current_question_index: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_score: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage_score: f64,
    #[serde(default)]
    pub is_passed: bool,
    #[serde(default)]
    pub tab_switches: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionDetailDto {
    pub id: QuestionId,
    pub question_text: String,
    #[serde(default)]
    pub question_image: Option<String>,
    pub difficulty: Difficulty,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub marks: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub negative_marks: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OptionDto {
    pub id: OptionId,
    pub option_text: String,
    #[serde(default)]
    pub option_image: Option<String>,
    pub option_order: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionDto {
    pub question_number: u32,
    pub question_detail: QuestionDetailDto,
    pub options: Vec<OptionDto>,
    #[serde(default)]
    pub visited_count: u32,
    #[serde(default)]
    pub time_spent_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerDto {
    pub question: QuestionId,
    #[serde(default)]
    pub selected_option: Option<OptionId>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub marks_awarded: Option<f64>,
    #[serde(default)]
    pub time_spent_seconds: u64,
    #[serde(default)]
    pub is_marked_for_review: bool,
    #[serde(default)]
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimerDto {
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub time_remaining_seconds: i64,
    pub is_time_up: bool,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressDto {
    pub total_questions: usize,
    pub answered: usize,
    #[serde(default)]
    pub marked_for_review: usize,
    #[serde(default)]
    pub time_spent_seconds: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultDto {
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub attempted_questions: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub wrong_answers: u32,
    #[serde(default)]
    pub unanswered_questions: u32,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub marks_obtained: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_marks: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub negative_marks: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score_percentage: f64,
}

// ─── Mapping ───────────────────────────────────────────────────────────────────

fn parse_status(raw: &str) -> Result<SessionStatus, ApiError> {
    raw.parse()
        .map_err(|err: exam_core::model::SessionStatusError| ApiError::Decode(err.to_string()))
}

impl TryFrom<SessionDto> for Session {
    type Error = ApiError;

    fn try_from(dto: SessionDto) -> Result<Self, Self::Error> {
        let current_question_index = usize::try_from(dto.current_question_index).map_err(|_| {
            ApiError::Decode(format!(
                "negative current_question_index {}",
                dto.current_question_index
            ))
        })?;
        Ok(Session {
            id: dto.id,
            exam_id: dto.exam,
            status: parse_status(&dto.status)?,
            started_at: dto.started_at,
            ended_at: dto.ended_at,
            submitted_at: dto.submitted_at,
            duration_minutes: dto.duration_minutes,
            current_question_index,
            total_score: dto.total_score,
            percentage_score: dto.percentage_score,
            is_passed: dto.is_passed,
            tab_switches: dto.tab_switches,
        })
    }
}

impl TryFrom<QuestionDto> for SessionQuestion {
    type Error = ApiError;

    fn try_from(dto: QuestionDto) -> Result<Self, Self::Error> {
        let detail = QuestionDetail {
            id: dto.question_detail.id,
            text: dto.question_detail.question_text,
            image: dto.question_detail.question_image,
            difficulty: dto.question_detail.difficulty,
            marks: dto.question_detail.marks,
            negative_marks: dto.question_detail.negative_marks,
        };
        let options = dto
            .options
            .into_iter()
            .map(|option| QuestionOption {
                id: option.id,
                text: option.option_text,
                image: option.option_image,
                order: option.option_order,
            })
            .collect();
        SessionQuestion::new(
            dto.question_number,
            detail,
            options,
            dto.visited_count,
            dto.time_spent_seconds,
        )
        .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

impl From<AnswerDto> for Answer {
    fn from(dto: AnswerDto) -> Self {
        Answer {
            question_id: dto.question,
            selected_option: dto.selected_option,
            is_marked_for_review: dto.is_marked_for_review,
            time_spent_seconds: dto.time_spent_seconds,
            is_correct: dto.is_correct,
            marks_awarded: dto.marks_awarded,
            answered_at: dto.answered_at,
        }
    }
}

impl TryFrom<TimerDto> for TimerSnapshot {
    type Error = ApiError;

    fn try_from(dto: TimerDto) -> Result<Self, Self::Error> {
        Ok(TimerSnapshot {
            started_at: dto.started_at,
            duration_minutes: dto.duration_minutes,
            // Overdue sessions report negative remaining time.
            time_remaining_seconds: u64::try_from(dto.time_remaining_seconds).unwrap_or(0),
            is_time_up: dto.is_time_up,
            status: parse_status(&dto.status)?,
        })
    }
}

impl TryFrom<ProgressDto> for ProgressSnapshot {
    type Error = ApiError;

    fn try_from(dto: ProgressDto) -> Result<Self, Self::Error> {
        if dto.answered > dto.total_questions {
            return Err(ApiError::Decode(format!(
                "answered {} exceeds total {}",
                dto.answered, dto.total_questions
            )));
        }
        Ok(ProgressSnapshot::from_counts(
            dto.total_questions,
            dto.answered,
            dto.marked_for_review,
            dto.time_spent_seconds,
        ))
    }
}

impl From<ResultDto> for ResultSummary {
    fn from(dto: ResultDto) -> Self {
        ResultSummary {
            total_questions: dto.total_questions,
            attempted_questions: dto.attempted_questions,
            correct_answers: dto.correct_answers,
            wrong_answers: dto.wrong_answers,
            unanswered_questions: dto.unanswered_questions,
            marks_obtained: dto.marks_obtained,
            total_marks: dto.total_marks,
            negative_marks: dto.negative_marks,
            score_percentage: dto.score_percentage,
        }
    }
}

impl TryFrom<ReportBody> for SessionReport {
    type Error = ApiError;

    fn try_from(body: ReportBody) -> Result<Self, Self::Error> {
        Ok(SessionReport {
            session: body.session.try_into()?,
            result: body.result.unwrap_or_default().into(),
        })
    }
}

// ─── Lenient numbers ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_f64(deserializer)?.unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(value)) => Ok(Some(value)),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SESSION: &str = "0b6f9c3e-2a55-4d8b-9a0e-7c1d2e3f4a5b";
    const EXAM: &str = "5d1e2f3a-4b5c-4d6e-8f70-8192a3b4c5d6";
    const QUESTION: &str = "11111111-2222-4333-8444-555555555555";
    const OPTION_A: &str = "aaaaaaaa-0000-4000-8000-000000000001";
    const OPTION_B: &str = "aaaaaaaa-0000-4000-8000-000000000002";

    #[test]
    fn session_envelope_decodes_with_string_decimals() {
        let raw = json!({
            "success": true,
            "message": "Exam started",
            "session": {
                "id": SESSION,
                "exam": EXAM,
                "status": "in_progress",
                "started_at": "2024-03-01T10:00:00Z",
                "duration_minutes": 45,
                "current_question_index": 2,
                "total_score": "0.00",
                "percentage_score": 0,
                "is_passed": false,
                "tab_switches": 0
            }
        });
        let envelope: Envelope<SessionBody> = serde_json::from_value(raw).unwrap();
        let session: Session = envelope.into_body().unwrap().session.try_into().unwrap();

        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.current_question_index, 2);
        assert_eq!(session.duration_seconds(), 2700);
    }

    #[test]
    fn unsuccessful_envelope_is_rejected_with_server_message() {
        let raw = json!({ "success": false, "error": "Session is not in progress" });
        let envelope: Envelope<Ack> = serde_json::from_value(raw).unwrap();
        let err = envelope.into_body().unwrap_err();
        assert!(matches!(err, ApiError::Rejected(msg) if msg == "Session is not in progress"));
    }

    #[test]
    fn unknown_status_fails_at_the_boundary() {
        let raw = json!({
            "started_at": null,
            "duration_minutes": 30,
            "time_remaining_seconds": 10,
            "is_time_up": false,
            "status": "running"
        });
        let dto: TimerDto = serde_json::from_value(raw).unwrap();
        assert!(matches!(TimerSnapshot::try_from(dto), Err(ApiError::Decode(_))));
    }

    #[test]
    fn overdue_timer_clamps_to_zero() {
        let raw = json!({
            "duration_minutes": 30,
            "time_remaining_seconds": -12,
            "is_time_up": true,
            "status": "in_progress"
        });
        let dto: TimerDto = serde_json::from_value(raw).unwrap();
        let timer = TimerSnapshot::try_from(dto).unwrap();
        assert_eq!(timer.time_remaining_seconds, 0);
        assert!(timer.signals_time_up());
    }

    #[test]
    fn question_options_are_validated_and_ordered() {
        let raw = json!({
            "question_number": 1,
            "question_detail": {
                "id": QUESTION,
                "question_text": "Capital of France?",
                "difficulty": "easy",
                "marks": "2.00",
                "negative_marks": "0.50",
                "tags": []
            },
            "options": [
                { "id": OPTION_B, "option_text": "Paris", "option_order": 2 },
                { "id": OPTION_A, "option_text": "Lyon", "option_order": 1 }
            ],
            "visited_count": 1,
            "time_spent_seconds": 9
        });
        let dto: QuestionDto = serde_json::from_value(raw).unwrap();
        let question = SessionQuestion::try_from(dto).unwrap();

        assert_eq!(question.option_at(0).unwrap().text, "Lyon");
        assert!((question.detail().negative_marks - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn question_without_options_is_refused() {
        let raw = json!({
            "question_number": 1,
            "question_detail": {
                "id": QUESTION,
                "question_text": "?",
                "difficulty": "hard",
                "marks": 1,
                "negative_marks": 0
            },
            "options": []
        });
        let dto: QuestionDto = serde_json::from_value(raw).unwrap();
        assert!(matches!(SessionQuestion::try_from(dto), Err(ApiError::Decode(_))));
    }

    #[test]
    fn answer_keeps_server_only_fields() {
        let raw = json!({
            "id": "ffffffff-0000-4000-8000-000000000000",
            "question": QUESTION,
            "question_text": "Capital of France?",
            "selected_option": OPTION_B,
            "is_correct": true,
            "marks_awarded": "2.00",
            "time_spent_seconds": 14,
            "is_marked_for_review": false,
            "answered_at": "2024-03-01T10:02:00Z"
        });
        let answer: Answer = serde_json::from_value::<AnswerDto>(raw).unwrap().into();
        assert_eq!(answer.is_correct, Some(true));
        assert_eq!(answer.marks_awarded, Some(2.0));
        assert_eq!(answer.selected_option.unwrap().to_string(), OPTION_B);
    }

    #[test]
    fn progress_with_impossible_counts_is_refused() {
        let raw = json!({ "total_questions": 3, "answered": 4, "unanswered": 0 });
        let dto: ProgressDto = serde_json::from_value(raw).unwrap();
        assert!(matches!(ProgressSnapshot::try_from(dto), Err(ApiError::Decode(_))));
    }
}
