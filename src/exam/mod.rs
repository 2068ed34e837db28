//! Examination content
//!
//! The ordered interview questions and the external services that provide
//! them.

pub mod client;
pub mod questions;

pub use client::{
    generate_or_default, HttpQuestionSource, JobDetails, QuestionFetchError, QuestionRequest,
    QuestionSource,
};
pub use questions::{default_questions, Question, QuestionSequencer, DEFAULT_QUESTIONS};
