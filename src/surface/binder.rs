//! Binding a capture handle to a rendering surface
//!
//! Playback is tried immediately. If the surface is not ready yet, a single
//! readiness listener is registered and playback is retried exactly once when
//! it fires. The listener is gone by the time `bind` returns, whatever the
//! outcome, and also if the `bind` future is dropped halfway.

use super::{PlayOutcome, PlaybackError, RenderSurface, SurfaceEvent};
use crate::capture::CaptureHandle;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct VideoSurfaceBinder {
    /// Handle currently playing on the surface
    bound: Mutex<Option<Uuid>>,
}

impl VideoSurfaceBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handle` to `surface` and resolve once frames are flowing.
    ///
    /// Binding a handle that is already playing is a no-op, so playback is
    /// started at most once per handle.
    pub async fn bind(&self, handle: &CaptureHandle, surface: &dyn RenderSurface) -> Result<(), PlaybackError> {
        if self.is_bound_to(handle) {
            tracing::debug!("Surface already playing handle {}", handle.id());
            return Ok(());
        }

        surface.attach(handle);

        // Subscribe before the first attempt so a readiness notification
        // emitted in between is not lost.
        let mut listener = surface.subscribe();

        let outcome = match surface.play() {
            Ok(PlayOutcome::NotReady) => {
                tracing::debug!("Surface not ready, waiting for readiness notification");
                loop {
                    match listener.recv().await {
                        Ok(SurfaceEvent::CanPlay) => {
                            tracing::debug!("Surface can play, retrying playback");
                            break surface.play();
                        }
                        Ok(SurfaceEvent::Playing) => break Ok(PlayOutcome::Playing),
                        Ok(SurfaceEvent::Error(message)) => break Err(PlaybackError::Surface(message)),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Surface listener lagged by {} events", skipped);
                        }
                        Err(RecvError::Closed) => break Err(PlaybackError::Unmounted),
                    }
                }
            }
            other => other,
        };
        drop(listener);

        match outcome {
            Ok(PlayOutcome::Playing) => {
                *self.bound.lock() = Some(handle.id());
                tracing::info!("Video playback started for handle {}", handle.id());
                Ok(())
            }
            Ok(PlayOutcome::NotReady) => {
                surface.detach();
                Err(PlaybackError::NotReady)
            }
            Err(e) => {
                tracing::error!("Video playback failed: {}", e);
                surface.detach();
                Err(e)
            }
        }
    }

    pub fn is_bound_to(&self, handle: &CaptureHandle) -> bool {
        *self.bound.lock() == Some(handle.id())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.lock().is_some()
    }

    /// Clear the surface and forget the binding. Idempotent.
    pub fn unbind(&self, surface: &dyn RenderSurface) {
        self.bound.lock().take();
        surface.detach();
    }
}
