//! Recording controller
//!
//! Runs one encoder session at a time and keeps the elapsed-seconds counter
//! the UI shows while a question is being answered.

use super::encoder::{EncoderFactory, MediaEncoder};
use super::state::{Answer, RecordingError, RecordingSession, RecordingState};
use crate::capture::CaptureHandle;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

const TICK: Duration = Duration::from_secs(1);

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    Started { question_index: usize },
    /// Whole seconds recorded so far
    Tick(u64),
    Stopped { question_index: usize, duration_seconds: u64 },
    Aborted { question_index: usize },
}

#[derive(Default)]
struct TickState {
    active: Option<Uuid>,
    seconds: u64,
}

/// Elapsed seconds of the running recording.
///
/// A tick only counts for the recording it was started for, so a ticker that
/// is still mid-poll when its recording ends cannot touch the next one.
#[derive(Default)]
struct TickCounter {
    state: Mutex<TickState>,
}

impl TickCounter {
    fn begin(&self, id: Uuid) {
        *self.state.lock() = TickState {
            active: Some(id),
            seconds: 0,
        };
    }

    /// Count one second for `id` and announce it. None once `id` has ended.
    fn tick(&self, id: Uuid, event_tx: &broadcast::Sender<RecordingEvent>) -> Option<u64> {
        let mut state = self.state.lock();
        if state.active != Some(id) {
            return None;
        }
        state.seconds += 1;
        let _ = event_tx.send(RecordingEvent::Tick(state.seconds));
        Some(state.seconds)
    }

    /// Stop counting; returns the seconds counted
    fn end(&self) -> u64 {
        let mut state = self.state.lock();
        state.active = None;
        std::mem::take(&mut state.seconds)
    }

    fn seconds(&self) -> u64 {
        self.state.lock().seconds
    }
}

struct ActiveRecording {
    id: Uuid,
    question_index: usize,
    encoder: Box<dyn MediaEncoder>,
    ticker: JoinHandle<()>,
}

pub struct RecordingController {
    encoders: Arc<dyn EncoderFactory>,
    active: Option<ActiveRecording>,
    elapsed: Arc<TickCounter>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingController {
    pub fn new(encoders: Arc<dyn EncoderFactory>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            encoders,
            active: None,
            elapsed: Arc::new(TickCounter::default()),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> RecordingState {
        if self.active.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Whole seconds recorded in the current session
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.seconds()
    }

    /// Open an encoder on `handle` for the answer to `question_index`.
    ///
    /// Must be called from within a tokio runtime; the elapsed-time tick runs
    /// as a task until the recording is stopped or aborted.
    pub fn start(&mut self, handle: &CaptureHandle, question_index: usize) -> Result<RecordingSession, RecordingError> {
        if self.active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let encoder = self.encoders.open(handle)?;
        let session = RecordingSession {
            id: Uuid::new_v4(),
            question_index,
            started_at: Utc::now(),
        };
        self.elapsed.begin(session.id);

        let id = session.id;
        let elapsed = self.elapsed.clone();
        let event_tx = self.event_tx.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            loop {
                interval.tick().await;
                match elapsed.tick(id, &event_tx) {
                    Some(seconds) => tracing::debug!("Recording tick: {}s", seconds),
                    None => break,
                }
            }
        });

        self.active = Some(ActiveRecording {
            id: session.id,
            question_index,
            encoder,
            ticker,
        });

        let _ = self.event_tx.send(RecordingEvent::Started { question_index });
        tracing::info!("Recording started for question {}", question_index + 1);
        Ok(session)
    }

    /// Finalize `session` into an [`Answer`].
    ///
    /// The tick is cancelled before this returns. A session that is no longer
    /// the active one (already stopped or aborted) yields `NotRecording`.
    pub fn stop(&mut self, session: RecordingSession) -> Result<Answer, RecordingError> {
        match &self.active {
            Some(active) if active.id == session.id => {}
            _ => return Err(RecordingError::NotRecording),
        }
        let Some(active) = self.active.take() else {
            return Err(RecordingError::NotRecording);
        };

        active.ticker.abort();
        let duration_seconds = self.elapsed.end();
        let media = active.encoder.finish()?;

        let _ = self.event_tx.send(RecordingEvent::Stopped {
            question_index: active.question_index,
            duration_seconds,
        });
        tracing::info!(
            "Recording stopped for question {}: {}s, {} bytes",
            active.question_index + 1,
            duration_seconds,
            media.data.len()
        );

        Ok(Answer {
            question_index: active.question_index,
            media,
            duration_seconds,
            recorded_at: session.started_at,
        })
    }

    /// Drop the active recording without producing an answer.
    /// Returns whether anything was recording.
    pub fn abort(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        active.ticker.abort();
        self.elapsed.end();
        active.encoder.abort();

        let _ = self.event_tx.send(RecordingEvent::Aborted {
            question_index: active.question_index,
        });
        tracing::info!("Recording aborted for question {}", active.question_index + 1);
        true
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.ticker.abort();
        }
    }
}
