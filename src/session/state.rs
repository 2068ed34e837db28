//! Session state, events and snapshots

use crate::exam::Question;
use crate::recorder::AnswerSummary;
use crate::utils::ErrorResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an examination session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    NotStarted,
    FetchingQuestions,
    AcquiringDevice,
    Ready,
    Recording,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// Events emitted while a session runs
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A new question is on screen
    QuestionChanged {
        index: usize,
        text: String,
        total: usize,
    },
    /// Whole seconds recorded for the current answer
    RecordingTick {
        seconds: u64,
    },
    AnswerRecorded(AnswerSummary),
    Error(ErrorResponse),
}

/// Point-in-time view of a session for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub job_id: String,
    pub state: SessionState,
    pub current_question: Option<Question>,
    pub question_count: usize,
    /// Indices of answered questions, in recording order
    pub answered: Vec<usize>,
    pub recording_seconds: u64,
    pub device_held: bool,
    pub surface_bound: bool,
    /// Completed through cancellation rather than finishing
    pub cancelled: bool,
    pub error: Option<ErrorResponse>,
}

impl SessionSnapshot {
    pub fn is_answered(&self, index: usize) -> bool {
        self.answered.contains(&index)
    }
}
