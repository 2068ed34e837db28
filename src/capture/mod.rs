//! Camera and microphone capture
//!
//! Backend-agnostic capture types, the device acquisition manager that owns
//! the session's capture handle, and (with `native-capture`) an OS backend.

pub mod manager;
pub mod traits;

#[cfg(feature = "native-capture")]
pub mod native;

pub use manager::{DeviceAcquisitionManager, RetryPolicy};
pub use traits::{
    AudioDeviceInfo, CameraInfo, CaptureBackend, CaptureConstraints, CaptureHandle, DeviceError,
    MediaChunk, MediaFeed, MediaTap, MediaTrack, Resolution, TrackKind,
};
