use tokio::sync::broadcast;

use exam_core::format::TimeUrgency;
use exam_core::model::{
    OptionId, ProgressSnapshot, QuestionId, SessionStatus, SubmitTrigger,
};

const EVENT_CAPACITY: usize = 256;

/// Notices published by a running session.
///
/// Surfaced failures travel here as well as through return values, so a
/// front end can render them without owning the call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    Navigated {
        index: usize,
        question_number: u32,
    },
    AnswerSaved {
        question: QuestionId,
        option: Option<OptionId>,
    },
    AnswerFailed {
        question: QuestionId,
        message: String,
    },
    ReviewChanged {
        question: QuestionId,
        marked: bool,
    },
    /// Republished countdown value between timer polls.
    Tick {
        remaining_seconds: u64,
        urgency: TimeUrgency,
    },
    TimeUp,
    Submitted {
        trigger: SubmitTrigger,
        status: SessionStatus,
    },
    SubmitFailed {
        trigger: SubmitTrigger,
        message: String,
    },
    ControlFailed {
        operation: &'static str,
        message: String,
    },
    ProgressUpdated(ProgressSnapshot),
    PollFailed {
        poll: &'static str,
        message: String,
    },
    TabHidden {
        switches: u32,
    },
}

/// Fan-out of [`SessionEvent`]s. Publishing without subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}
