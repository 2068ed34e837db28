//! In-memory collaborators for unit tests

use crate::capture::{CaptureBackend, CaptureConstraints, CaptureHandle, DeviceError, MediaFeed, MediaTrack, TrackKind};
use crate::exam::{JobDetails, Question, QuestionFetchError, QuestionRequest, QuestionSource};
use crate::recorder::BufferedEncoderFactory;
use crate::session::SessionDeps;
use crate::surface::{PlayOutcome, PlaybackError, RenderSurface, SurfaceEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

/// Poll `condition` until it holds, letting other tasks run in between
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..5_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition was never reached");
}

struct FakeTrack {
    kind: TrackKind,
    live: AtomicBool,
    stops: Arc<AtomicUsize>,
}

impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        format!("fake {:?}", self.kind)
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Capture backend handing out fake tracks
#[derive(Default)]
pub struct FakeCapture {
    pub open_calls: AtomicUsize,
    pub track_stops: Arc<AtomicUsize>,
    gate: Option<Notify>,
    opens_tracks_early: bool,
    video_only: bool,
    failures: Mutex<VecDeque<DeviceError>>,
    handles: Mutex<Vec<CaptureHandle>>,
}

impl FakeCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `open` stays pending until [`grant`](Self::grant), like a permission prompt
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Notify::new()),
            ..Self::default()
        })
    }

    /// Like [`gated`](Self::gated), but the tracks start before the prompt
    /// is answered, the way camera threads spin up while `open` is pending
    pub fn opening_tracks_early() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Notify::new()),
            opens_tracks_early: true,
            ..Self::default()
        })
    }

    pub fn video_only() -> Arc<Self> {
        Arc::new(Self {
            video_only: true,
            ..Self::default()
        })
    }

    /// Fail the first opens with `errors`, in order, then succeed
    pub fn failing_with(errors: Vec<DeviceError>) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(errors.into()),
            ..Self::default()
        })
    }

    pub fn grant(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Handles opened so far whose tracks were never stopped
    pub fn live_handles(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_stopped()).count()
    }

    fn open_handle(&self) -> CaptureHandle {
        let mut tracks = vec![self.track(TrackKind::Video)];
        if !self.video_only {
            tracks.push(self.track(TrackKind::Audio));
        }
        let handle = CaptureHandle::new(tracks, MediaFeed::new());
        self.handles.lock().push(handle.clone());
        handle
    }

    fn track(&self, kind: TrackKind) -> Box<dyn MediaTrack> {
        Box::new(FakeTrack {
            kind,
            live: AtomicBool::new(true),
            stops: self.track_stops.clone(),
        })
    }
}

#[async_trait]
impl CaptureBackend for FakeCapture {
    async fn open(&self, _constraints: &CaptureConstraints) -> Result<CaptureHandle, DeviceError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let early = self.opens_tracks_early.then(|| self.open_handle());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(error) = self.failures.lock().pop_front() {
            if let Some(handle) = early {
                handle.stop_tracks();
            }
            return Err(error);
        }
        Ok(early.unwrap_or_else(|| self.open_handle()))
    }
}

/// Surface that plays immediately or only after it becomes ready
pub struct FakeSurface {
    pub play_calls: AtomicUsize,
    pub detach_calls: AtomicUsize,
    ready: AtomicBool,
    attached: Mutex<Option<Uuid>>,
    events: broadcast::Sender<SurfaceEvent>,
}

impl FakeSurface {
    fn with_readiness(ready: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(8);
        Arc::new(Self {
            play_calls: AtomicUsize::new(0),
            detach_calls: AtomicUsize::new(0),
            ready: AtomicBool::new(ready),
            attached: Mutex::new(None),
            events,
        })
    }

    pub fn ready() -> Arc<Self> {
        Self::with_readiness(true)
    }

    pub fn not_ready() -> Arc<Self> {
        Self::with_readiness(false)
    }

    pub fn attached(&self) -> Option<Uuid> {
        *self.attached.lock()
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn become_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.emit(SurfaceEvent::CanPlay);
    }

    pub fn emit(&self, event: SurfaceEvent) {
        let _ = self.events.send(event);
    }
}

impl RenderSurface for FakeSurface {
    fn attach(&self, handle: &CaptureHandle) {
        *self.attached.lock() = Some(handle.id());
    }

    fn detach(&self) {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        self.attached.lock().take();
    }

    fn play(&self) -> Result<PlayOutcome, PlaybackError> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        if self.attached.lock().is_some() && self.ready.load(Ordering::SeqCst) {
            Ok(PlayOutcome::Playing)
        } else {
            Ok(PlayOutcome::NotReady)
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }
}

/// Job and question service with canned answers
#[derive(Default)]
pub struct FakeQuestions {
    pub job_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub last_request: Mutex<Option<QuestionRequest>>,
    job_missing: bool,
    questions: Option<Vec<Question>>,
    gate: Option<Notify>,
    generate_delay: Option<Duration>,
}

impl FakeQuestions {
    pub fn with_questions(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            questions: Some(Question::numbered(texts.iter().copied())),
            ..Self::default()
        })
    }

    /// Job lookup works, question generation fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn job_missing() -> Arc<Self> {
        Arc::new(Self {
            job_missing: true,
            ..Self::default()
        })
    }

    /// Job lookup stays pending until [`release`](Self::release)
    pub fn gated(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            questions: Some(Question::numbered(texts.iter().copied())),
            gate: Some(Notify::new()),
            ..Self::default()
        })
    }

    /// Question generation takes `delay` before answering
    pub fn slow(texts: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            questions: Some(Question::numbered(texts.iter().copied())),
            generate_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl QuestionSource for FakeQuestions {
    async fn fetch_job(&self, job_id: &str) -> Result<JobDetails, QuestionFetchError> {
        self.job_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.job_missing {
            return Err(QuestionFetchError::Status(404));
        }
        Ok(JobDetails {
            title: format!("Job {job_id}"),
            description: "Build things".to_string(),
            required_skills: vec!["rust".to_string()],
        })
    }

    async fn generate_questions(&self, request: &QuestionRequest) -> Result<Vec<Question>, QuestionFetchError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        if let Some(delay) = self.generate_delay {
            tokio::time::sleep(delay).await;
        }
        self.questions.clone().ok_or(QuestionFetchError::Status(500))
    }
}

pub fn deps(capture: &Arc<FakeCapture>, questions: &Arc<FakeQuestions>) -> SessionDeps {
    SessionDeps {
        questions: questions.clone(),
        capture: capture.clone(),
        encoders: Arc::new(BufferedEncoderFactory),
    }
}
