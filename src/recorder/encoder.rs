//! Per-question encoder sessions
//!
//! The buffered encoder keeps each track's chunks apart in a small framed
//! container: per chunk a one byte track tag (`V` or `A`), the payload length
//! as a little-endian `u32`, then the payload. [`split_tracks`] reads it back.

use super::state::{EncodedMedia, RecordingError};
use crate::capture::{CaptureHandle, MediaChunk, MediaTap, TrackKind};

pub const TRACK_FRAMES_MIME_TYPE: &str = "application/x-examination-track-frames";

const VIDEO_TAG: u8 = b'V';
const AUDIO_TAG: u8 = b'A';
const HEADER_LEN: usize = 5;

/// One open encoder, producing the media of a single answer.
pub trait MediaEncoder: Send {
    /// Finalize everything captured so far into a blob
    fn finish(self: Box<Self>) -> Result<EncodedMedia, RecordingError>;

    /// Throw the recording away
    fn abort(self: Box<Self>);
}

/// Opens encoders on a capture handle.
pub trait EncoderFactory: Send + Sync {
    fn open(&self, handle: &CaptureHandle) -> Result<Box<dyn MediaEncoder>, RecordingError>;
}

/// Collects the handle's chunks in memory, framed per track
#[derive(Debug, Clone, Default)]
pub struct BufferedEncoderFactory;

impl EncoderFactory for BufferedEncoderFactory {
    fn open(&self, handle: &CaptureHandle) -> Result<Box<dyn MediaEncoder>, RecordingError> {
        if handle.is_stopped() {
            return Err(RecordingError::Encoder("capture handle is no longer live".to_string()));
        }
        Ok(Box::new(BufferedEncoder { tap: handle.tap() }))
    }
}

struct BufferedEncoder {
    tap: MediaTap,
}

impl MediaEncoder for BufferedEncoder {
    fn finish(self: Box<Self>) -> Result<EncodedMedia, RecordingError> {
        let this = *self;
        let chunks = this.tap.into_chunks();
        let data = frame_tracks(&chunks)?;
        tracing::debug!("Encoder finished: {} chunks, {} bytes", chunks.len(), data.len());
        Ok(EncodedMedia {
            mime_type: TRACK_FRAMES_MIME_TYPE.to_string(),
            data,
        })
    }

    fn abort(self: Box<Self>) {
        tracing::debug!("Encoder aborted, discarding {} bytes", self.tap.len());
    }
}

fn frame_tracks(chunks: &[MediaChunk]) -> Result<Vec<u8>, RecordingError> {
    let total = chunks.iter().map(|c| HEADER_LEN + c.data.len()).sum();
    let mut data = Vec::with_capacity(total);
    for chunk in chunks {
        let len = u32::try_from(chunk.data.len())
            .map_err(|_| RecordingError::Encoder(format!("chunk of {} bytes is too large", chunk.data.len())))?;
        data.push(match chunk.kind {
            TrackKind::Video => VIDEO_TAG,
            TrackKind::Audio => AUDIO_TAG,
        });
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&chunk.data);
    }
    Ok(data)
}

/// Split a buffered recording back into its per-track chunks
pub fn split_tracks(mut data: &[u8]) -> Result<Vec<MediaChunk>, RecordingError> {
    let mut chunks = Vec::new();
    while !data.is_empty() {
        if data.len() < HEADER_LEN {
            return Err(RecordingError::Encoder("truncated chunk header".to_string()));
        }
        let kind = match data[0] {
            VIDEO_TAG => TrackKind::Video,
            AUDIO_TAG => TrackKind::Audio,
            other => return Err(RecordingError::Encoder(format!("unknown track tag {other:#04x}"))),
        };
        let len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
        let rest = &data[HEADER_LEN..];
        if rest.len() < len {
            return Err(RecordingError::Encoder("truncated chunk payload".to_string()));
        }
        chunks.push(MediaChunk {
            kind,
            data: rest[..len].to_vec(),
        });
        data = &rest[len..];
    }
    Ok(chunks)
}
