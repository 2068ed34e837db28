//! Device acquisition
//!
//! Owns the single capture handle of an examination session: opens it,
//! verifies it carries live audio and video, and tears it down exactly once.

use super::traits::{CaptureBackend, CaptureConstraints, CaptureHandle, DeviceError, TrackKind};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Default)]
struct Slot {
    handle: Option<CaptureHandle>,
    released: bool,
}

/// Backoff for transient acquisition failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u8,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u8, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Never retry
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn should_retry(&self, attempt: u8, error: &DeviceError) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        error.is_transient()
    }

    pub async fn wait_before_retry(&self, attempt: u8) {
        let multiplier = 2u32.saturating_pow(attempt as u32);
        let delay = self.base_delay.saturating_mul(multiplier);

        tracing::info!(
            "Retrying device acquisition in {}ms (attempt {})",
            delay.as_millis(),
            attempt + 2
        );
        sleep(delay).await;
    }
}

/// Requests and holds the camera/microphone handle for one session.
///
/// Clones share the same slot, so an acquisition running on another task and
/// a `release` issued by the session always agree on who owns the handle.
#[derive(Clone)]
pub struct DeviceAcquisitionManager {
    backend: Arc<dyn CaptureBackend>,
    slot: Arc<Mutex<Slot>>,
}

impl DeviceAcquisitionManager {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Open the camera and microphone.
    ///
    /// If `release` runs while the backend is still opening the device, the
    /// freshly opened handle is stopped on arrival and `Released` is returned.
    pub async fn acquire(&self, constraints: &CaptureConstraints) -> Result<CaptureHandle, DeviceError> {
        {
            let slot = self.slot.lock();
            if slot.released {
                return Err(DeviceError::Released);
            }
            if let Some(handle) = &slot.handle {
                return Ok(handle.clone());
            }
        }

        tracing::info!(
            "Requesting capture devices ({}x{} @ {}fps, facing {})",
            constraints.resolution.width,
            constraints.resolution.height,
            constraints.frame_rate,
            constraints.facing_mode
        );

        let handle = self.backend.open(constraints).await?;

        for kind in [TrackKind::Video, TrackKind::Audio] {
            if !handle.has_live(kind) {
                tracing::warn!("Capture handle has no live {:?} track", kind);
                handle.stop_tracks();
                return Err(DeviceError::DeviceNotFound);
            }
        }

        let mut slot = self.slot.lock();
        if slot.released {
            drop(slot);
            tracing::info!("Session released during acquisition, stopping new handle");
            handle.stop_tracks();
            return Err(DeviceError::Released);
        }
        if let Some(previous) = slot.handle.replace(handle.clone()) {
            previous.stop_tracks();
        }

        tracing::info!("Capture devices acquired: {:?}", handle);
        Ok(handle)
    }

    /// `acquire`, retrying transient failures according to `policy`
    pub async fn acquire_with_retry(
        &self,
        constraints: &CaptureConstraints,
        policy: &RetryPolicy,
    ) -> Result<CaptureHandle, DeviceError> {
        let mut attempt = 0u8;
        loop {
            match self.acquire(constraints).await {
                Ok(handle) => return Ok(handle),
                Err(e) if policy.should_retry(attempt, &e) => {
                    tracing::warn!("Device acquisition failed: {}", e);
                    policy.wait_before_retry(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The held handle, shared for the session's lifetime
    pub fn handle(&self) -> Option<CaptureHandle> {
        self.slot.lock().handle.clone()
    }

    pub fn is_held(&self) -> bool {
        self.slot.lock().handle.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.slot.lock().released
    }

    /// Stop every track of the held handle.
    ///
    /// Idempotent: safe with nothing held, mid-acquisition, or after a
    /// previous release. Returns whether a handle was actually stopped.
    pub fn release(&self) -> bool {
        let handle = {
            let mut slot = self.slot.lock();
            slot.released = true;
            slot.handle.take()
        };

        match handle {
            Some(handle) => {
                let stopped = handle.stop_tracks();
                tracing::info!("Capture devices released: {:?}", handle);
                stopped
            }
            None => false,
        }
    }

    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }
}
