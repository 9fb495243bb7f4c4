mod controller;
mod progress;
mod runtime;
mod submission;
mod timer_sync;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::{
    AnswerOutcome, ControlOutcome, ReviewOutcome, SessionController, SubmitOutcome,
};
pub use progress::{ProgressAggregator, ProgressTicket};
pub use runtime::SessionRuntime;
pub use submission::{SubmissionCoordinator, SubmitPermit};
pub use timer_sync::TimerSynchronizer;
