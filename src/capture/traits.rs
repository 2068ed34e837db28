//! Capture trait definitions
//!
//! Platform-agnostic types for camera and microphone capture. A backend opens
//! the hardware and hands back a [`CaptureHandle`]; everything downstream only
//! ever sees the handle.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use uuid::Uuid;

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is an input device
    pub is_input: bool,

    /// Whether this is the default device
    pub is_default: bool,
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// What the session asks of the capture hardware.
///
/// Audio and video are always both required; the resolution and frame rate
/// are ideals the backend may round to whatever the device supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConstraints {
    /// Ideal video resolution
    pub resolution: Resolution,

    /// Ideal frame rate
    pub frame_rate: u32,

    /// Which camera to prefer ("user" = front facing)
    pub facing_mode: String,

    /// Specific camera to open (None = default camera)
    pub camera_id: Option<String>,

    /// Specific microphone to open (None = default input)
    pub microphone_id: Option<String>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            resolution: Resolution {
                width: 1280,
                height: 720,
            },
            frame_rate: 30,
            facing_mode: "user".to_string(),
            camera_id: None,
            microphone_id: None,
        }
    }
}

/// Device acquisition failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Camera and microphone access denied")]
    PermissionDenied,

    #[error("No camera or microphone found")]
    DeviceNotFound,

    #[error("Error accessing media devices: {0}")]
    Other(String),

    #[error("Capture was released before the device was granted")]
    Released,
}

impl DeviceError {
    /// Classify a platform error name or message.
    ///
    /// Recognises the browser `getUserMedia` error names as well as the
    /// free-form messages native camera/audio stacks produce.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                return Self::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                return Self::DeviceNotFound
            }
            _ => {}
        }

        let lower = raw.to_ascii_lowercase();
        if ["permission", "denied", "not authorized", "unauthorized"]
            .iter()
            .any(|p| lower.contains(p))
        {
            Self::PermissionDenied
        } else if ["not found", "no device", "no such device", "no camera", "no input"]
            .iter()
            .any(|p| lower.contains(p))
        {
            Self::DeviceNotFound
        } else {
            Self::Other(raw.to_string())
        }
    }

    /// Whether retrying the acquisition could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

/// Kind of media a track carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// A single live media track of an open device.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Human readable device label
    fn label(&self) -> String;

    fn is_live(&self) -> bool;

    /// Stop the track and free the underlying device.
    fn stop(&self);
}

/// One piece of data from a single track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub kind: TrackKind,
    pub data: Vec<u8>,
}

type TapBuffer = Arc<Mutex<Vec<MediaChunk>>>;

/// Producer side of a handle's media data.
///
/// Backends push raw chunks here, tagged with the track they came from; every
/// live [`MediaTap`] receives a copy. Chunks pushed while nobody is tapping
/// are dropped.
#[derive(Clone, Default)]
pub struct MediaFeed {
    taps: Arc<Mutex<Vec<Weak<Mutex<Vec<MediaChunk>>>>>>,
}

impl MediaFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: TrackKind, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut taps = self.taps.lock();
        taps.retain(|tap| match tap.upgrade() {
            Some(buffer) => {
                buffer.lock().push(MediaChunk {
                    kind,
                    data: chunk.to_vec(),
                });
                true
            }
            None => false,
        });
    }

    pub fn tap(&self) -> MediaTap {
        let buffer: TapBuffer = Arc::new(Mutex::new(Vec::new()));
        self.taps.lock().push(Arc::downgrade(&buffer));
        MediaTap { buffer }
    }

    /// Number of taps still attached
    pub fn tap_count(&self) -> usize {
        let mut taps = self.taps.lock();
        taps.retain(|tap| tap.strong_count() > 0);
        taps.len()
    }
}

/// Consumer side of a [`MediaFeed`]; detaches when dropped.
pub struct MediaTap {
    buffer: TapBuffer,
}

impl MediaTap {
    /// Bytes collected so far, over all tracks
    pub fn len(&self) -> usize {
        self.buffer.lock().iter().map(|c| c.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Detach and return every chunk collected so far, in arrival order
    pub fn into_chunks(self) -> Vec<MediaChunk> {
        std::mem::take(&mut *self.buffer.lock())
    }
}

struct HandleInner {
    id: Uuid,
    tracks: Vec<Box<dyn MediaTrack>>,
    feed: MediaFeed,
    stopped: AtomicBool,
}

/// Opaque handle to an open camera + microphone pair.
///
/// Cloning a handle only shares it. Stopping the tracks is reserved to the
/// crate so that only [`DeviceAcquisitionManager`](super::DeviceAcquisitionManager)
/// can release the hardware.
#[derive(Clone)]
pub struct CaptureHandle {
    inner: Arc<HandleInner>,
}

impl CaptureHandle {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>, feed: MediaFeed) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                tracks,
                feed,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn tracks(&self) -> impl Iterator<Item = &dyn MediaTrack> {
        self.inner.tracks.iter().map(|t| t.as_ref())
    }

    /// Whether a live track of the given kind exists
    pub fn has_live(&self, kind: TrackKind) -> bool {
        !self.is_stopped() && self.tracks().any(|t| t.kind() == kind && t.is_live())
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Start collecting the handle's media data
    pub fn tap(&self) -> MediaTap {
        self.inner.feed.tap()
    }

    pub fn feed(&self) -> &MediaFeed {
        &self.inner.feed
    }

    /// Stop every track. Returns false if the tracks were already stopped.
    pub(crate) fn stop_tracks(&self) -> bool {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        for track in &self.inner.tracks {
            track.stop();
            tracing::debug!("Track stopped: {:?} ({})", track.kind(), track.label());
        }
        true
    }
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("id", &self.inner.id)
            .field("tracks", &self.inner.tracks.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Something that can open camera + microphone hardware.
///
/// `open` may stay pending for as long as the user takes to answer a
/// permission prompt.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<CaptureHandle, DeviceError>;

    /// Cameras this backend can open
    fn cameras(&self) -> Vec<CameraInfo> {
        Vec::new()
    }

    /// Microphones this backend can open
    fn microphones(&self) -> Vec<AudioDeviceInfo> {
        Vec::new()
    }
}
