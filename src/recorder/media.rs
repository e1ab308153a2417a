//! Media stream model
//!
//! A `MediaStream` is a descriptor of live tracks handed out by a
//! `MediaBackend`. The backend owns the underlying platform handles; the
//! recorder only holds descriptors and must `release` every stream it opened.

use crate::capture::level::AudioTap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while acquiring media from the platform
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

impl CaptureError {
    /// Stable code sent to the frontend
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied(_) => "PERMISSION_DENIED",
            CaptureError::InvalidSource(_) => "INVALID_SOURCE",
            CaptureError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            CaptureError::Platform(_) => "PLATFORM_ERROR",
        }
    }
}

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    /// Screen or window video
    Video,
    /// Desktop audio captured alongside the video source
    SystemAudio,
    /// Microphone input
    Microphone,
}

impl TrackKind {
    pub fn is_audio(&self) -> bool {
        !matches!(self, TrackKind::Video)
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::SystemAudio => write!(f, "system-audio"),
            TrackKind::Microphone => write!(f, "microphone"),
        }
    }
}

/// Pixel rectangle of a display on the virtual desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Settings the platform actually applied to a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    /// Capture source id (video/system audio) or device id (microphone)
    pub source_id: Option<String>,
    /// Area of the virtual desktop a screen track covers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<ScreenRegion>,
}

/// A single live track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
    pub settings: TrackSettings,
    /// False once the platform ended the track (device unplugged, source closed)
    pub live: bool,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>, settings: TrackSettings) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            settings,
            live: true,
        }
    }
}

/// A set of tracks acquired together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// First track of the given kind
    pub fn track(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.track(TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind.is_audio())
    }

    pub fn has_audio(&self) -> bool {
        self.audio_tracks().next().is_some()
    }

    /// Whether any track of `other` is also carried by this stream
    pub fn shares_tracks(&self, other: &MediaStream) -> bool {
        self.tracks
            .iter()
            .any(|t| other.tracks.iter().any(|o| o.id == t.id))
    }
}

/// Parameters for opening a screen/window stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRequest {
    pub source_id: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub system_audio: bool,
}

/// An open microphone with an optional sample tap for level metering
pub struct MicrophoneStream {
    pub stream: MediaStream,
    pub tap: Option<Arc<dyn AudioTap>>,
}

impl std::fmt::Debug for MicrophoneStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneStream")
            .field("stream", &self.stream)
            .field("tap", &self.tap.is_some())
            .finish()
    }
}

/// Platform media acquisition
///
/// Implementations wrap whatever the platform offers (a webview's media
/// devices, PipeWire, CoreGraphics, cpal). Every stream returned by an
/// `open_*` call stays open until passed to `release`.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Open a screen/window capture stream, with a system audio track if requested
    /// and available.
    async fn open_display(&self, request: &DisplayRequest) -> Result<MediaStream, CaptureError>;

    /// Open a microphone by device id
    async fn open_microphone(&self, device_id: &str) -> Result<MicrophoneStream, CaptureError>;

    /// Stop every track of a stream and free its platform handles
    fn release(&self, stream: &MediaStream);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_track_lookup() {
        let stream = MediaStream::new(vec![
            MediaTrack::new(TrackKind::Video, "Screen 1", TrackSettings::default()),
            MediaTrack::new(TrackKind::SystemAudio, "Desktop audio", TrackSettings::default()),
        ]);

        assert!(stream.video_track().is_some());
        assert!(stream.has_audio());
        assert!(stream.track(TrackKind::Microphone).is_none());
        assert_eq!(stream.audio_tracks().count(), 1);
    }

    #[test]
    fn test_composed_stream_shares_source_tracks() {
        let preview = MediaStream::new(vec![MediaTrack::new(
            TrackKind::Video,
            "Screen 1",
            TrackSettings::default(),
        )]);
        let composed = MediaStream::new(preview.tracks.clone());
        let other = MediaStream::new(vec![MediaTrack::new(
            TrackKind::Video,
            "Screen 1",
            TrackSettings::default(),
        )]);

        assert!(composed.shares_tracks(&preview));
        assert!(!composed.shares_tracks(&other));
    }

    #[test]
    fn test_capture_error_into_recording_error() {
        use crate::recorder::RecordingError;

        let err: RecordingError = CaptureError::InvalidSource("window:9".into()).into();
        assert!(matches!(err, RecordingError::InvalidSource(id) if id == "window:9"));

        let err: RecordingError = CaptureError::Platform("boom".into()).into();
        assert_eq!(err.code(), "CAPTURE_ERROR");
    }
}
