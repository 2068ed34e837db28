//! Video rendering surfaces
//!
//! A surface is whatever presents the live camera picture to the candidate.
//! It may be mounted before or after the capture handle exists; the
//! [`VideoSurfaceBinder`] is the one place the two meet.

pub mod binder;

pub use binder::VideoSurfaceBinder;

use crate::capture::CaptureHandle;
use thiserror::Error;
use tokio::sync::broadcast;

/// Notifications a surface emits while loading a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Enough data is buffered to start playback
    CanPlay,
    /// Frames are flowing
    Playing,
    /// The surface failed to render
    Error(String),
}

/// Result of asking a surface to start playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Playing,
    /// Not mounted yet or not enough data buffered
    NotReady,
}

/// Playback failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Video playback failed: {0}")]
    Surface(String),

    #[error("Video surface was still not ready after signalling it could play")]
    NotReady,

    #[error("Video surface was unmounted before playback started")]
    Unmounted,
}

/// A rendering surface for live capture.
pub trait RenderSurface: Send + Sync {
    /// Point the surface at the handle's video
    fn attach(&self, handle: &CaptureHandle);

    /// Clear the surface's source
    fn detach(&self);

    /// Try to start playback right now
    fn play(&self) -> Result<PlayOutcome, PlaybackError>;

    /// Register a listener for surface events. Dropping the receiver removes
    /// the listener.
    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent>;
}
