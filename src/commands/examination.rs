//! Examination commands

use crate::capture::{AudioDeviceInfo, CameraInfo, CaptureBackend};
use crate::config::ExaminationConfig;
use crate::exam::{HttpQuestionSource, QuestionFetchError};
use crate::recorder::{Answer, AnswerSummary, BufferedEncoderFactory};
use crate::session::{ExaminationController, SessionDeps, SessionSnapshot};
use crate::surface::RenderSurface;
use crate::utils::{ErrorResponse, SessionError};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state for examinations
pub struct ExaminationState {
    pub config: ExaminationConfig,
    deps: SessionDeps,
    session: Mutex<Option<ExaminationController>>,
}

impl ExaminationState {
    pub fn new(config: ExaminationConfig, deps: SessionDeps) -> Self {
        Self {
            config,
            deps,
            session: Mutex::new(None),
        }
    }

    /// Questions from the recruiting API, answers buffered in memory
    pub fn with_http_source(
        config: ExaminationConfig,
        capture: Arc<dyn CaptureBackend>,
    ) -> Result<Self, QuestionFetchError> {
        let questions = Arc::new(HttpQuestionSource::new(&config)?);
        let deps = SessionDeps {
            questions,
            capture,
            encoders: Arc::new(BufferedEncoderFactory::default()),
        };
        Ok(Self::new(config, deps))
    }

    /// Same as [`with_http_source`](Self::with_http_source) on the OS camera and microphone
    #[cfg(feature = "native-capture")]
    pub fn native(config: ExaminationConfig) -> Result<Self, QuestionFetchError> {
        Self::with_http_source(config, Arc::new(crate::capture::native::NativeCaptureBackend::default()))
    }
}

fn no_session() -> ErrorResponse {
    ErrorResponse::from(SessionError::Closed)
}

/// Start an examination for `job_id`, cancelling any running one
pub async fn start_examination(state: &ExaminationState, job_id: String) -> Result<SessionSnapshot, ErrorResponse> {
    let mut session = state.session.lock().await;
    if let Some(previous) = session.take() {
        tracing::info!("Replacing examination session {}", previous.session_id());
        previous.cancel().await;
    }

    let controller = ExaminationController::spawn(job_id, state.config.clone(), state.deps.clone());
    controller.start().await?;
    let snapshot = controller.snapshot().await?;
    *session = Some(controller);
    Ok(snapshot)
}

/// Mount the video surface of the running examination
pub async fn attach_video_surface(
    state: &ExaminationState,
    surface: Arc<dyn RenderSurface>,
) -> Result<(), ErrorResponse> {
    let session = state.session.lock().await;
    let controller = session.as_ref().ok_or_else(no_session)?;
    Ok(controller.attach_surface(surface).await?)
}

pub async fn start_recording(state: &ExaminationState) -> Result<SessionSnapshot, ErrorResponse> {
    let session = state.session.lock().await;
    let controller = session.as_ref().ok_or_else(no_session)?;
    controller.start_recording().await?;
    Ok(controller.snapshot().await?)
}

pub async fn stop_recording(state: &ExaminationState) -> Result<AnswerSummary, ErrorResponse> {
    let session = state.session.lock().await;
    let controller = session.as_ref().ok_or_else(no_session)?;
    Ok(controller.stop_recording().await?)
}

pub async fn next_question(state: &ExaminationState) -> Result<SessionSnapshot, ErrorResponse> {
    let session = state.session.lock().await;
    let controller = session.as_ref().ok_or_else(no_session)?;
    controller.next_question().await?;
    Ok(controller.snapshot().await?)
}

/// Cancel the running examination. Answers stay available until
/// [`end_examination`] is called.
pub async fn cancel_examination(state: &ExaminationState) -> Result<bool, ErrorResponse> {
    let session = state.session.lock().await;
    let controller = session.as_ref().ok_or_else(no_session)?;
    Ok(controller.cancel().await)
}

pub async fn get_examination_state(state: &ExaminationState) -> Result<SessionSnapshot, ErrorResponse> {
    let session = state.session.lock().await;
    let controller = session.as_ref().ok_or_else(no_session)?;
    Ok(controller.snapshot().await?)
}

/// Hand off the recorded answers of a finished examination
pub async fn take_answers(state: &ExaminationState) -> Result<Vec<Answer>, ErrorResponse> {
    let session = state.session.lock().await;
    let controller = session.as_ref().ok_or_else(no_session)?;
    Ok(controller.take_answers().await?)
}

/// Unmount: drop the session, releasing whatever it still holds.
/// Returns whether a session existed.
pub async fn end_examination(state: &ExaminationState) -> bool {
    state.session.lock().await.take().is_some()
}

/// Get list of available cameras/webcams
pub async fn get_cameras(state: &ExaminationState) -> Vec<CameraInfo> {
    state.deps.capture.cameras()
}

/// Get list of available audio input devices (microphones)
pub async fn get_audio_devices(state: &ExaminationState) -> Vec<AudioDeviceInfo> {
    state.deps.capture.microphones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::testing::{deps, wait_until, FakeCapture, FakeQuestions, FakeSurface};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn state(capture: &Arc<FakeCapture>) -> ExaminationState {
        ExaminationState::new(
            ExaminationConfig::default(),
            deps(capture, &FakeQuestions::with_questions(&["Only question?"])),
        )
    }

    async fn wait_ready(state: &ExaminationState) {
        for _ in 0..1_000 {
            if get_examination_state(state).await.unwrap().state == SessionState::Ready {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("examination never became ready");
    }

    #[tokio::test]
    async fn test_commands_without_session_report_closed() {
        let state = state(&FakeCapture::new());

        let err = start_recording(&state).await.unwrap_err();
        assert_eq!(err.code, "SESSION_CLOSED");
        assert!(!end_examination(&state).await);
        assert!(get_cameras(&state).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_question_examination() {
        let capture = FakeCapture::new();
        let state = state(&capture);

        let snapshot = start_examination(&state, "job-1".into()).await.unwrap();
        assert_eq!(snapshot.job_id, "job-1");
        attach_video_surface(&state, FakeSurface::ready()).await.unwrap();
        wait_ready(&state).await;

        let err = next_question(&state).await.unwrap_err();
        assert_eq!(err.code, "UNANSWERED");

        let snapshot = start_recording(&state).await.unwrap();
        assert_eq!(snapshot.state, SessionState::Recording);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let summary = stop_recording(&state).await.unwrap();
        assert_eq!(summary.duration_seconds, 1);

        let snapshot = next_question(&state).await.unwrap();
        assert_eq!(snapshot.state, SessionState::Completed);
        assert_eq!(take_answers(&state).await.unwrap().len(), 1);
        assert_eq!(capture.track_stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_restart_cancels_previous_session() {
        let capture = FakeCapture::new();
        let state = state(&capture);

        start_examination(&state, "job-1".into()).await.unwrap();
        attach_video_surface(&state, FakeSurface::ready()).await.unwrap();
        wait_ready(&state).await;

        let snapshot = start_examination(&state, "job-2".into()).await.unwrap();
        assert_eq!(snapshot.job_id, "job-2");
        assert_eq!(capture.track_stops.load(Ordering::SeqCst), 2);

        assert!(end_examination(&state).await);
        wait_until(|| capture.live_handles() == 0).await;
    }
}
