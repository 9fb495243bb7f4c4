#![forbid(unsafe_code)]

pub mod answers;
pub mod countdown;
pub mod error;
pub mod format;
pub mod keyboard;
pub mod model;
pub mod navigation;
pub mod progress;
pub mod submission;
pub mod time;

pub use error::Error;
pub use time::Clock;
