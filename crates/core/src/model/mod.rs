mod answer;
mod ids;
mod progress;
mod question;
mod session;
mod timer;

pub use ids::{ExamId, OptionId, ParseIdError, QuestionId, SessionId};

pub use answer::Answer;
pub use progress::ProgressSnapshot;
pub use question::{Difficulty, QuestionDetail, QuestionError, QuestionOption, QuestionSet, SessionQuestion};
pub use session::{ResultSummary, Session, SessionStatus, SessionStatusError, SubmitTrigger};
pub use timer::TimerSnapshot;
