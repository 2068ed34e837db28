//! Error types and handling
//!
//! Session-level error type and its user-facing rendering.

use crate::capture::DeviceError;
use crate::recorder::RecordingError;
use crate::session::SessionState;
use crate::surface::PlaybackError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything an examination session operation can fail with
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Job details unavailable: {0}")]
    JobUnavailable(String),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("Cannot {action} while the session is {state:?}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("Question {} has already been answered", .0 + 1)]
    AlreadyAnswered(usize),

    #[error("Question {} has not been answered yet", .0 + 1)]
    Unanswered(usize),

    #[error("Stop the recording before moving to the next question")]
    RecordingActive,

    #[error("The examination session has ended")]
    Closed,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::JobUnavailable(_) => "JOB_UNAVAILABLE",
            SessionError::Device(DeviceError::PermissionDenied) => "PERMISSION_DENIED",
            SessionError::Device(DeviceError::DeviceNotFound) => "DEVICE_NOT_FOUND",
            SessionError::Device(_) => "DEVICE_ERROR",
            SessionError::Playback(_) => "PLAYBACK_ERROR",
            SessionError::Recording(_) => "RECORDING_ERROR",
            SessionError::InvalidState { .. } => "INVALID_STATE",
            SessionError::AlreadyAnswered(_) => "ALREADY_ANSWERED",
            SessionError::Unanswered(_) => "UNANSWERED",
            SessionError::RecordingActive => "RECORDING_ACTIVE",
            SessionError::Closed => "SESSION_CLOSED",
        }
    }

    /// What the candidate can do about it, for errors they can act on
    pub fn remediation(&self) -> Option<String> {
        match self {
            SessionError::Device(DeviceError::PermissionDenied) => Some(
                "Camera and microphone access denied. Please allow access in your browser settings."
                    .to_string(),
            ),
            SessionError::Device(DeviceError::DeviceNotFound) => {
                Some("No camera or microphone found. Please ensure one is connected.".to_string())
            }
            SessionError::Device(DeviceError::Other(message)) => {
                Some(format!("Error accessing media devices: {message}"))
            }
            SessionError::Playback(e) => Some(format!("Video error: {e}")),
            SessionError::JobUnavailable(_) => {
                Some("The examination could not be prepared. Please try again later.".to_string())
            }
            _ => None,
        }
    }
}

/// Error response for frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl From<&SessionError> for ErrorResponse {
    fn from(error: &SessionError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
            remediation: error.remediation(),
        }
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(error: SessionError) -> Self {
        ErrorResponse::from(&error)
    }
}

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_errors_carry_remediation() {
        let response = ErrorResponse::from(SessionError::Device(DeviceError::PermissionDenied));
        assert_eq!(response.code, "PERMISSION_DENIED");
        assert!(response.remediation.unwrap().contains("browser settings"));

        let response = ErrorResponse::from(SessionError::Device(DeviceError::Other("busy".into())));
        assert_eq!(response.code, "DEVICE_ERROR");
        assert_eq!(response.remediation.as_deref(), Some("Error accessing media devices: busy"));
    }

    #[test]
    fn test_internal_errors_have_no_remediation() {
        let response = ErrorResponse::from(SessionError::Recording(RecordingError::AlreadyRecording));
        assert_eq!(response.code, "RECORDING_ERROR");
        assert!(response.remediation.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("remediation").is_none());
    }

    #[test]
    fn test_question_numbers_are_one_based_in_messages() {
        assert_eq!(
            SessionError::Unanswered(0).to_string(),
            "Question 1 has not been answered yet"
        );
    }
}
