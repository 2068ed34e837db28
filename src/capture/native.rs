//! Native camera and microphone capture
//!
//! Camera frames come from nokhwa and microphone samples from cpal. Each track
//! runs on its own capture thread (neither library's stream types are `Send`)
//! and pushes raw data into the handle's [`MediaFeed`].

use super::traits::{
    AudioDeviceInfo, CameraInfo, CaptureBackend, CaptureConstraints, CaptureHandle, DeviceError,
    MediaFeed, MediaTrack, Resolution, TrackKind,
};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution as CameraResolution,
};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| CameraInfo {
                id: camera_index_id(info.index()),
                name: info.human_name().to_string(),
                supported_resolutions: vec![
                    Resolution {
                        width: 1920,
                        height: 1080,
                    },
                    Resolution {
                        width: 1280,
                        height: 720,
                    },
                    Resolution {
                        width: 640,
                        height: 480,
                    },
                ],
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Get list of available audio input devices
pub fn get_audio_input_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioDeviceInfo {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                is_input: true,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate audio input devices: {}", e);
            Vec::new()
        }
    }
}

fn camera_index_id(index: &CameraIndex) -> String {
    match index {
        CameraIndex::Index(i) => i.to_string(),
        CameraIndex::String(s) => s.to_string(),
    }
}

fn camera_index(device_id: Option<&str>) -> CameraIndex {
    match device_id {
        Some(id) => match id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(id.to_string()),
        },
        None => CameraIndex::Index(0),
    }
}

/// A track backed by a capture thread
struct ThreadTrack {
    kind: TrackKind,
    label: Mutex<String>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MediaTrack for ThreadTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        self.label.lock().clone()
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

type Ready = oneshot::Receiver<Result<String, DeviceError>>;

fn spawn_camera(index: CameraIndex, constraints: &CaptureConstraints, feed: MediaFeed) -> (ThreadTrack, Ready) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let running = Arc::new(AtomicBool::new(true));
    let is_running = running.clone();
    let requested = CameraFormat::new(
        CameraResolution::new(constraints.resolution.width, constraints.resolution.height),
        FrameFormat::MJPEG,
        constraints.frame_rate,
    );

    let thread = std::thread::spawn(move || {
        let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(requested));
        let mut camera = match Camera::new(index.clone(), format) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to open camera {:?}: {:?}", index, e);
                is_running.store(false, Ordering::SeqCst);
                let _ = ready_tx.send(Err(DeviceError::classify(&e.to_string())));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            tracing::error!("Failed to open camera stream: {:?}", e);
            is_running.store(false, Ordering::SeqCst);
            let _ = ready_tx.send(Err(DeviceError::classify(&e.to_string())));
            return;
        }

        let camera_format = camera.camera_format();
        tracing::info!(
            "Camera opened: {}x{} @ {}fps, format={:?}",
            camera_format.resolution().width(),
            camera_format.resolution().height(),
            camera_format.frame_rate(),
            camera_format.format()
        );
        let _ = ready_tx.send(Ok(camera.info().human_name().to_string()));

        while is_running.load(Ordering::SeqCst) {
            match camera.frame() {
                Ok(frame) => feed.push(TrackKind::Video, frame.buffer()),
                Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
            }
        }

        if let Err(e) = camera.stop_stream() {
            tracing::warn!("Error stopping camera stream: {:?}", e);
        }
        tracing::info!("Camera capture thread stopped");
    });

    let track = ThreadTrack {
        kind: TrackKind::Video,
        label: Mutex::new("camera".to_string()),
        running,
        thread: Mutex::new(Some(thread)),
    };
    (track, ready_rx)
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::warn!("Microphone stream error: {}", err);
}

fn pick_input_device(host: &cpal::Host, preferred: Option<&str>) -> Option<cpal::Device> {
    if let Some(name) = preferred {
        if let Ok(mut devices) = host.input_devices() {
            if let Some(device) = devices.find(|d| d.name().map(|n| n == name).unwrap_or(false)) {
                return Some(device);
            }
        }
        tracing::warn!("Preferred input device '{}' not found, falling back to default", name);
    }
    host.default_input_device()
}

fn spawn_microphone(preferred: Option<String>, feed: MediaFeed) -> (ThreadTrack, Ready) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let running = Arc::new(AtomicBool::new(true));
    let is_running = running.clone();

    let thread = std::thread::spawn(move || {
        let fail = |error: DeviceError| {
            is_running.store(false, Ordering::SeqCst);
            error
        };

        let host = cpal::default_host();
        let Some(device) = pick_input_device(&host, preferred.as_deref()) else {
            let _ = ready_tx.send(Err(fail(DeviceError::DeviceNotFound)));
            return;
        };
        let name = device.name().unwrap_or_else(|_| "Unknown input".to_string());

        let config = match device.default_input_config() {
            Ok(c) => c,
            Err(e) => {
                let _ = ready_tx.send(Err(fail(DeviceError::classify(&e.to_string()))));
                return;
            }
        };
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let bytes: Vec<u8> = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                    feed.push(TrackKind::Audio, &bytes);
                },
                log_stream_error,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let bytes: Vec<u8> = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                    feed.push(TrackKind::Audio, &bytes);
                },
                log_stream_error,
                None,
            ),
            other => {
                let message = format!("Unsupported sample format {:?}", other);
                let _ = ready_tx.send(Err(fail(DeviceError::Other(message))));
                return;
            }
        };

        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                let _ = ready_tx.send(Err(fail(DeviceError::classify(&e.to_string()))));
                return;
            }
        };
        if let Err(e) = stream.play() {
            let _ = ready_tx.send(Err(fail(DeviceError::classify(&e.to_string()))));
            return;
        }

        tracing::info!(
            "Microphone opened: {} ({} Hz, {} channels)",
            name,
            stream_config.sample_rate.0,
            stream_config.channels
        );
        let _ = ready_tx.send(Ok(name));

        while is_running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(50));
        }
        drop(stream);
        tracing::info!("Microphone capture thread stopped");
    });

    let track = ThreadTrack {
        kind: TrackKind::Audio,
        label: Mutex::new("microphone".to_string()),
        running,
        thread: Mutex::new(Some(thread)),
    };
    (track, ready_rx)
}

async fn await_ready(track: &ThreadTrack, ready: Ready) -> Result<(), DeviceError> {
    match ready.await {
        Ok(Ok(label)) => {
            *track.label.lock() = label;
            Ok(())
        }
        Ok(Err(e)) => {
            track.stop();
            Err(e)
        }
        Err(_) => {
            track.stop();
            Err(DeviceError::Other("capture thread exited before reporting".to_string()))
        }
    }
}

/// Capture backend using the operating system's camera and microphone
#[derive(Debug, Default)]
pub struct NativeCaptureBackend;

impl NativeCaptureBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaptureBackend for NativeCaptureBackend {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<CaptureHandle, DeviceError> {
        if get_cameras().is_empty() {
            return Err(DeviceError::DeviceNotFound);
        }

        let feed = MediaFeed::new();

        let (camera, camera_ready) = spawn_camera(
            camera_index(constraints.camera_id.as_deref()),
            constraints,
            feed.clone(),
        );
        await_ready(&camera, camera_ready).await?;

        let (microphone, microphone_ready) = spawn_microphone(constraints.microphone_id.clone(), feed.clone());
        if let Err(e) = await_ready(&microphone, microphone_ready).await {
            camera.stop();
            return Err(e);
        }

        Ok(CaptureHandle::new(vec![Box::new(camera), Box::new(microphone)], feed))
    }

    fn cameras(&self) -> Vec<CameraInfo> {
        get_cameras()
    }

    fn microphones(&self) -> Vec<AudioDeviceInfo> {
        get_audio_input_devices()
    }
}
