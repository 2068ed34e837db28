//! Examination session state machine
//!
//! Every transition of an examination goes through here:
//!
//! | From              | Event                          | To                |
//! |-------------------|--------------------------------|-------------------|
//! | NotStarted        | start                          | FetchingQuestions |
//! | FetchingQuestions | questions (or fallback)        | AcquiringDevice   |
//! | AcquiringDevice   | handle held + surface playing  | Ready             |
//! | any non-terminal  | device/playback/job failure    | Failed            |
//! | Ready             | start recording                | Recording         |
//! | Recording         | stop recording                 | Ready             |
//! | Ready             | next question, not last        | Ready             |
//! | Ready             | next question, last            | Completed         |
//! | any non-terminal  | cancel / teardown              | Completed         |
//!
//! Question fetch, device acquisition and surface binding run as tasks and
//! report back through [`Branch`] messages, so they may finish in any order.

use super::state::{SessionEvent, SessionSnapshot, SessionState};
use crate::capture::{CaptureBackend, DeviceAcquisitionManager, DeviceError};
use crate::config::ExaminationConfig;
use crate::exam::{
    default_questions, generate_or_default, JobDetails, Question, QuestionFetchError,
    QuestionRequest, QuestionSequencer, QuestionSource,
};
use crate::recorder::{Answer, AnswerSummary, EncoderFactory, RecordingController, RecordingError, RecordingEvent, RecordingSession};
use crate::surface::{PlaybackError, RenderSurface, VideoSurfaceBinder};
use crate::utils::{ErrorResponse, SessionError, SessionResult};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// External collaborators of a session
#[derive(Clone)]
pub struct SessionDeps {
    pub questions: Arc<dyn QuestionSource>,
    pub capture: Arc<dyn CaptureBackend>,
    pub encoders: Arc<dyn EncoderFactory>,
}

/// Outcome of one of the session's background operations
pub(crate) enum Branch {
    JobLoaded(JobDetails),
    JobFailed(QuestionFetchError),
    Questions(Vec<Question>),
    DeviceAcquired,
    DeviceFailed(DeviceError),
    SurfaceBound {
        generation: u64,
        result: Result<(), PlaybackError>,
    },
}

#[derive(Default)]
struct Tasks {
    fetch: Option<JoinHandle<()>>,
    acquire: Option<JoinHandle<()>>,
    bind: Option<JoinHandle<()>>,
}

impl Tasks {
    /// Abort the fetch and bind tasks.
    ///
    /// A pending acquisition is left to finish: the manager has been released
    /// by then and stops whatever the backend hands back.
    fn cancel(&mut self) {
        for task in [self.fetch.take(), self.bind.take()].into_iter().flatten() {
            task.abort();
        }
        self.acquire.take();
    }
}

pub struct ExaminationStateMachine {
    session_id: Uuid,
    job_id: String,
    config: ExaminationConfig,
    state: SessionState,

    source: Arc<dyn QuestionSource>,
    job: Option<JobDetails>,
    sequencer: QuestionSequencer,
    questions_loaded: bool,

    devices: DeviceAcquisitionManager,
    binder: Arc<VideoSurfaceBinder>,
    surface: Option<Arc<dyn RenderSurface>>,
    surface_bound: bool,
    bind_generation: u64,
    /// Device failure that arrived before the questions did
    deferred_failure: Option<DeviceError>,

    recorder: RecordingController,
    recording: Option<RecordingSession>,
    answers: Vec<Answer>,

    tasks: Tasks,
    branch_tx: mpsc::UnboundedSender<Branch>,
    event_tx: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,

    cancelled: bool,
    last_error: Option<ErrorResponse>,
}

impl ExaminationStateMachine {
    pub(crate) fn new(
        job_id: String,
        config: ExaminationConfig,
        deps: SessionDeps,
        branch_tx: mpsc::UnboundedSender<Branch>,
        event_tx: broadcast::Sender<SessionEvent>,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            job_id,
            config,
            state: SessionState::NotStarted,
            source: deps.questions,
            job: None,
            sequencer: QuestionSequencer::new(),
            questions_loaded: false,
            devices: DeviceAcquisitionManager::new(deps.capture),
            binder: Arc::new(VideoSurfaceBinder::new()),
            surface: None,
            surface_bound: false,
            bind_generation: 0,
            deferred_failure: None,
            recorder: RecordingController::new(deps.encoders),
            recording: None,
            answers: Vec::new(),
            tasks: Tasks::default(),
            branch_tx,
            event_tx,
            state_tx,
            cancelled: false,
            last_error: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn job(&self) -> Option<&JobDetails> {
        self.job.as_ref()
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub(crate) fn recording_events(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recorder.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            job_id: self.job_id.clone(),
            state: self.state,
            current_question: self.sequencer.current().cloned(),
            question_count: self.sequencer.len(),
            answered: self.answers.iter().map(|a| a.question_index).collect(),
            recording_seconds: self.recorder.elapsed_seconds(),
            device_held: self.devices.is_held(),
            surface_bound: self.surface_bound,
            cancelled: self.cancelled,
            error: self.last_error.clone(),
        }
    }

    fn transition(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        tracing::info!("Session {}: {:?} -> {:?}", self.session_id, self.state, to);
        self.state = to;
        self.state_tx.send_replace(to);
        let _ = self.event_tx.send(SessionEvent::StateChanged(to));
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state,
        }
    }

    fn is_answered(&self, index: usize) -> bool {
        self.answers.iter().any(|a| a.question_index == index)
    }

    fn announce_question(&self) {
        if let Some(question) = self.sequencer.current() {
            let _ = self.event_tx.send(SessionEvent::QuestionChanged {
                index: question.index,
                text: question.text.clone(),
                total: self.sequencer.len(),
            });
        }
    }

    /// Kick off the examination: job metadata, then questions, with device
    /// acquisition starting as soon as the job is known.
    pub fn start(&mut self) -> SessionResult<()> {
        if self.state != SessionState::NotStarted {
            return Err(self.invalid("start the examination"));
        }
        self.transition(SessionState::FetchingQuestions);

        let source = self.source.clone();
        let branch_tx = self.branch_tx.clone();
        let job_id = self.job_id.clone();
        let config = self.config.clone();
        self.tasks.fetch = Some(tokio::spawn(async move {
            let job = match source.fetch_job(&job_id).await {
                Ok(job) => job,
                Err(e) => {
                    let _ = branch_tx.send(Branch::JobFailed(e));
                    return;
                }
            };
            let request = QuestionRequest::for_job(&job_id, &job, &config);
            let _ = branch_tx.send(Branch::JobLoaded(job));

            let questions = generate_or_default(source.as_ref(), &request).await;
            let _ = branch_tx.send(Branch::Questions(questions));
        }));
        Ok(())
    }

    fn begin_acquisition(&mut self) {
        if self.tasks.acquire.is_some() || self.devices.is_held() {
            return;
        }

        let devices = self.devices.clone();
        let constraints = self.config.capture.clone();
        let policy = self.config.retry_policy();
        let branch_tx = self.branch_tx.clone();
        self.tasks.acquire = Some(tokio::spawn(async move {
            let outcome = match devices.acquire_with_retry(&constraints, &policy).await {
                Ok(_) => Branch::DeviceAcquired,
                Err(e) => Branch::DeviceFailed(e),
            };
            let _ = branch_tx.send(outcome);
        }));
    }

    fn try_bind(&mut self) {
        if self.surface_bound || self.tasks.bind.is_some() {
            return;
        }
        let (Some(handle), Some(surface)) = (self.devices.handle(), self.surface.clone()) else {
            return;
        };

        let binder = self.binder.clone();
        let branch_tx = self.branch_tx.clone();
        let generation = self.bind_generation;
        self.tasks.bind = Some(tokio::spawn(async move {
            let result = binder.bind(&handle, surface.as_ref()).await;
            let _ = branch_tx.send(Branch::SurfaceBound { generation, result });
        }));
    }

    /// `Ready` is only reached once questions, device and surface are all in
    fn try_join(&mut self) {
        if self.state != SessionState::AcquiringDevice
            || !self.questions_loaded
            || !self.surface_bound
            || !self.devices.is_held()
        {
            return;
        }
        self.transition(SessionState::Ready);
        self.announce_question();
    }

    pub(crate) fn handle_branch(&mut self, branch: Branch) {
        if self.state.is_terminal() {
            tracing::debug!("Session {} ignoring late result in {:?}", self.session_id, self.state);
            return;
        }

        match branch {
            Branch::JobLoaded(job) => {
                tracing::info!("Job details loaded: {}", job.title);
                self.job = Some(job);
                self.begin_acquisition();
            }
            Branch::JobFailed(e) => {
                self.tasks.fetch = None;
                self.fail(SessionError::JobUnavailable(e.to_string()));
            }
            Branch::Questions(questions) => {
                self.tasks.fetch = None;
                let questions = if questions.is_empty() {
                    default_questions()
                } else {
                    questions
                };
                tracing::info!("Loaded {} questions", questions.len());
                self.sequencer.load(questions);
                self.questions_loaded = true;
                if self.state == SessionState::FetchingQuestions {
                    self.transition(SessionState::AcquiringDevice);
                }
                if let Some(e) = self.deferred_failure.take() {
                    self.fail(SessionError::Device(e));
                    return;
                }
                self.try_join();
            }
            Branch::DeviceAcquired => {
                self.tasks.acquire = None;
                self.try_bind();
                self.try_join();
            }
            Branch::DeviceFailed(e) => {
                self.tasks.acquire = None;
                if self.questions_loaded {
                    self.fail(SessionError::Device(e));
                } else {
                    tracing::warn!("Device acquisition failed while questions load: {}", e);
                    self.deferred_failure = Some(e);
                }
            }
            Branch::SurfaceBound { generation, result } => {
                if generation != self.bind_generation {
                    tracing::debug!("Ignoring binding result for a replaced surface");
                    return;
                }
                self.tasks.bind = None;
                match result {
                    Ok(()) => {
                        self.surface_bound = true;
                        self.try_join();
                    }
                    Err(e) => self.fail(SessionError::Playback(e)),
                }
            }
        }
    }

    /// Mount (or remount, before `Ready`) the rendering surface.
    pub fn attach_surface(&mut self, surface: Arc<dyn RenderSurface>) -> SessionResult<()> {
        if self.state.is_terminal() || matches!(self.state, SessionState::Ready | SessionState::Recording) {
            return Err(self.invalid("attach a video surface"));
        }

        if let Some(previous) = self.surface.take() {
            if let Some(task) = self.tasks.bind.take() {
                task.abort();
            }
            self.binder.unbind(previous.as_ref());
            self.surface_bound = false;
            self.bind_generation += 1;
        }

        self.surface = Some(surface);
        self.try_bind();
        Ok(())
    }

    /// Start recording the answer to the current question
    pub fn start_recording(&mut self) -> SessionResult<usize> {
        if self.state != SessionState::Ready {
            return Err(self.invalid("start recording"));
        }
        let index = self.sequencer.index().ok_or_else(|| self.invalid("start recording"))?;
        if self.is_answered(index) {
            return Err(SessionError::AlreadyAnswered(index));
        }
        let handle = self.devices.handle().ok_or(SessionError::Device(DeviceError::Released))?;

        let session = self.recorder.start(&handle, index)?;
        self.recording = Some(session);
        self.transition(SessionState::Recording);
        Ok(index)
    }

    /// Finish the running recording and keep its answer
    pub fn stop_recording(&mut self) -> SessionResult<AnswerSummary> {
        if self.state != SessionState::Recording {
            return Err(self.invalid("stop recording"));
        }
        let session = self
            .recording
            .take()
            .ok_or(SessionError::Recording(RecordingError::NotRecording))?;

        let result = self.recorder.stop(session);
        self.transition(SessionState::Ready);
        let answer = result?;

        let summary = answer.summary();
        self.answers.push(answer);
        let _ = self.event_tx.send(SessionEvent::AnswerRecorded(summary.clone()));
        Ok(summary)
    }

    /// Move past an answered question, completing the examination after the
    /// last one. Rejected without any change while recording.
    pub fn next_question(&mut self) -> SessionResult<SessionState> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Recording => {
                tracing::debug!("Next question ignored while recording");
                return Err(SessionError::RecordingActive);
            }
            _ => return Err(self.invalid("move to the next question")),
        }

        let index = self
            .sequencer
            .index()
            .ok_or_else(|| self.invalid("move to the next question"))?;
        if !self.is_answered(index) {
            return Err(SessionError::Unanswered(index));
        }

        if self.sequencer.is_last() {
            self.devices.release();
            self.sequencer.finish();
            self.cleanup();
            self.transition(SessionState::Completed);
            tracing::info!(
                "Examination {} completed with {} answers",
                self.session_id,
                self.answers.len()
            );
        } else {
            self.sequencer.advance();
            self.announce_question();
        }
        Ok(self.state)
    }

    /// Abandon the session from any non-terminal state.
    ///
    /// Any running recording is dropped without producing an answer. Returns
    /// false if the session had already ended.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        tracing::info!("Session {} cancelled in {:?}", self.session_id, self.state);
        self.cleanup();
        self.cancelled = true;
        self.sequencer.finish();
        self.transition(SessionState::Completed);
        true
    }

    /// Hand the answers off, ordered by question, once the session has ended
    pub fn take_answers(&mut self) -> SessionResult<Vec<Answer>> {
        if !self.state.is_terminal() {
            return Err(self.invalid("hand off answers"));
        }
        let mut answers = std::mem::take(&mut self.answers);
        answers.sort_by_key(|a| a.question_index);
        Ok(answers)
    }

    fn fail(&mut self, error: SessionError) {
        tracing::error!("Session {} failed: {}", self.session_id, error);
        let response = ErrorResponse::from(&error);
        self.last_error = Some(response.clone());
        let _ = self.event_tx.send(SessionEvent::Error(response));
        self.cleanup();
        self.transition(SessionState::Failed);
    }

    /// Release everything the session holds. Idempotent.
    fn cleanup(&mut self) {
        self.recorder.abort();
        self.recording = None;
        self.tasks.cancel();
        self.devices.release();
        if let Some(surface) = &self.surface {
            self.binder.unbind(surface.as_ref());
        }
        self.surface_bound = false;
    }
}

impl Drop for ExaminationStateMachine {
    fn drop(&mut self) {
        self.cleanup();
    }
}
