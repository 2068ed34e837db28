//! Recording state and answer artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
}

/// Recorder errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordingError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Encoder error: {0}")]
    Encoder(String),
}

/// Token for an open recording.
///
/// Deliberately not `Clone`: handing it to
/// [`RecordingController::stop`](super::RecordingController::stop) is the
/// only way to finish a recording.
#[derive(Debug)]
pub struct RecordingSession {
    pub(crate) id: Uuid,
    pub(crate) question_index: usize,
    pub(crate) started_at: DateTime<Utc>,
}

impl RecordingSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn question_index(&self) -> usize {
        self.question_index
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Finalized media of one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMedia {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// The recorded answer to one question
#[derive(Debug, Clone)]
pub struct Answer {
    pub question_index: usize,
    pub media: EncodedMedia,
    pub duration_seconds: u64,
    pub recorded_at: DateTime<Utc>,
}

impl Answer {
    pub fn summary(&self) -> AnswerSummary {
        AnswerSummary {
            question_index: self.question_index,
            duration_seconds: self.duration_seconds,
            mime_type: self.media.mime_type.clone(),
            size_bytes: self.media.data.len(),
            recorded_at: self.recorded_at,
        }
    }
}

/// What the UI gets to see of an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSummary {
    pub question_index: usize,
    pub duration_seconds: u64,
    pub mime_type: String,
    pub size_bytes: usize,
    pub recorded_at: DateTime<Utc>,
}

/// Render elapsed seconds as `m:ss` for the recording badge
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(9), "0:09");
        assert_eq!(format_elapsed(75), "1:15");
        assert_eq!(format_elapsed(600), "10:00");
    }
}
