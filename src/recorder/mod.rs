//! Per-question recording
//!
//! - RecordingController runs one encoder session at a time
//! - EncoderFactory abstracts the encoder so native targets can plug in theirs
//! - Answers are the finalized per-question artifacts

pub mod controller;
pub mod encoder;
pub mod state;

pub use controller::{RecordingController, RecordingEvent};
pub use encoder::{split_tracks, BufferedEncoderFactory, EncoderFactory, MediaEncoder, TRACK_FRAMES_MIME_TYPE};
pub use state::{format_elapsed, Answer, AnswerSummary, EncodedMedia, RecordingError, RecordingSession, RecordingState};
