use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{ExamId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown session status: {raw}")]
pub struct SessionStatusError {
    raw: String,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of an exam session.
///
/// `not_started → in_progress ⇄ paused → {completed | auto_submitted | abandoned}`.
/// The last three are terminal: nothing leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
    AutoSubmitted,
    Abandoned,
}

impl SessionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::AutoSubmitted | SessionStatus::Abandoned
        )
    }

    /// Answer capture, navigation and keyboard shortcuts are only live here.
    #[must_use]
    pub fn accepts_input(self) -> bool {
        self == SessionStatus::InProgress
    }

    /// Whether the server may move a session from `self` to `next`.
    ///
    /// Local operations apply stricter gates on top of this (e.g. submit is
    /// only offered from `in_progress`), but any status the server reports
    /// must still be reachable through this graph to be adopted.
    #[must_use]
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::{Abandoned, AutoSubmitted, Completed, InProgress, NotStarted, Paused};

        match self {
            NotStarted => matches!(next, InProgress | Abandoned),
            InProgress => matches!(next, Paused | Completed | AutoSubmitted | Abandoned),
            Paused => matches!(next, InProgress | Completed | AutoSubmitted | Abandoned),
            Completed | AutoSubmitted | Abandoned => false,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::AutoSubmitted => "auto_submitted",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not_started" => Ok(SessionStatus::NotStarted),
            "in_progress" => Ok(SessionStatus::InProgress),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            "auto_submitted" => Ok(SessionStatus::AutoSubmitted),
            "abandoned" => Ok(SessionStatus::Abandoned),
            other => Err(SessionStatusError {
                raw: other.to_string(),
            }),
        }
    }
}

//
// ─── SUBMIT TRIGGER ────────────────────────────────────────────────────────────
//

/// Who asked for the final submission.
///
/// The server effect is identical; the distinction survives only in the
/// terminal status so reports can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Manual,
    Auto,
}

impl SubmitTrigger {
    #[must_use]
    pub fn terminal_status(self) -> SessionStatus {
        match self {
            SubmitTrigger::Manual => SessionStatus::Completed,
            SubmitTrigger::Auto => SessionStatus::AutoSubmitted,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::Auto => "auto",
        }
    }
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Server-owned record of one attempt.
///
/// The client only ever holds a copy; every field here was reported by the
/// backend, except `tab_switches`, which is also counted locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub exam_id: ExamId,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub current_question_index: usize,
    pub total_score: f64,
    pub percentage_score: f64,
    pub is_passed: bool,
    pub tab_switches: u32,
}

impl Session {
    /// A freshly created session as the backend would return it from "start exam".
    #[must_use]
    pub fn started(
        id: SessionId,
        exam_id: ExamId,
        duration_minutes: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            exam_id,
            status: SessionStatus::InProgress,
            started_at: Some(started_at),
            ended_at: None,
            submitted_at: None,
            duration_minutes,
            current_question_index: 0,
            total_score: 0.0,
            percentage_score: 0.0,
            is_passed: false,
            tab_switches: 0,
        }
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

/// Score breakdown returned with a session report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSummary {
    pub total_questions: u32,
    pub attempted_questions: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub unanswered_questions: u32,
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub negative_marks: f64,
    pub score_percentage: f64,
}
