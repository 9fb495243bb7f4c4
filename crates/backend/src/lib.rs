#![forbid(unsafe_code)]

//! Backend boundary for exam sessions: the `ExamApi` trait with an HTTP
//! adapter and an in-memory implementation.

pub mod api;
pub mod http;
pub mod memory;

pub use api::{ApiError, ExamApi, SessionReport};
pub use http::{HttpConfig, HttpExamApi};
pub use memory::{Endpoint, ExamFixture, FixtureQuestion, Gate, InMemoryExamApi};
