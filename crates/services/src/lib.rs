#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod poll;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use events::{EventBus, SessionEvent};
pub use poll::{PollGroup, PollTask};
pub use sessions::{
    AnswerOutcome, ControlOutcome, ReviewOutcome, SessionController, SessionRuntime,
    SubmitOutcome,
};
