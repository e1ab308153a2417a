//! Stream composition
//!
//! Builds the preview stream for a capture source and assembles the single
//! stream handed to the encoder: video from the preview, plus system audio and
//! microphone tracks as the audio configuration allows. Optional audio that
//! cannot be included is dropped with a warning; only a missing video track is
//! an error.

use super::media::{
    CaptureError, DisplayRequest, MediaBackend, MediaStream, MicrophoneStream, TrackKind,
};
use super::quality::QualityProfile;
use super::state::AudioConfiguration;
use crate::capture::{AudioDeviceInfo, DeviceProvider};
use std::sync::Arc;

/// Result of composing the recording stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub stream: MediaStream,
    /// Audio tracks that were requested but could not be included
    pub dropped: Vec<TrackKind>,
}

impl Composition {
    pub fn is_degraded(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Assembles preview and recording streams from a media backend
pub struct StreamComposer {
    backend: Arc<dyn MediaBackend>,
}

impl StreamComposer {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn MediaBackend> {
        &self.backend
    }

    /// Open a preview stream for `source_id` at the profile's resolution.
    ///
    /// When system audio is requested but the platform refuses it, the preview
    /// falls back to video only.
    pub async fn compose_preview(
        &self,
        source_id: &str,
        profile: &QualityProfile,
        audio: &AudioConfiguration,
    ) -> Result<MediaStream, CaptureError> {
        let mut request = DisplayRequest {
            source_id: source_id.to_string(),
            width: profile.width,
            height: profile.height,
            frame_rate: profile.frame_rate,
            system_audio: audio.system_audio_enabled,
        };

        tracing::info!("Starting preview of {} using {}", source_id, profile.label);

        let stream = match self.backend.open_display(&request).await {
            Ok(stream) => stream,
            Err(err @ CaptureError::InvalidSource(_)) => return Err(err),
            Err(err) if request.system_audio => {
                tracing::warn!("Preview with system audio failed ({}), retrying without audio", err);
                request.system_audio = false;
                self.backend.open_display(&request).await?
            }
            Err(err) => return Err(err),
        };

        let Some(video) = stream.video_track() else {
            self.backend.release(&stream);
            return Err(CaptureError::Platform(format!(
                "Source {} produced no video track",
                source_id
            )));
        };

        tracing::info!(
            "Video resolution: {}x{} @ {}fps",
            video.settings.width.unwrap_or_default(),
            video.settings.height.unwrap_or_default(),
            video.settings.frame_rate.unwrap_or_default()
        );
        if stream.track(TrackKind::SystemAudio).is_some() {
            tracing::info!("System audio track available");
        }

        Ok(stream)
    }

    /// Combine the preview's video with the enabled audio sources.
    pub fn compose_recording(
        &self,
        preview: &MediaStream,
        audio: &AudioConfiguration,
        microphone: Option<&MediaStream>,
    ) -> Result<Composition, CaptureError> {
        let video = preview
            .video_track()
            .filter(|t| t.live)
            .ok_or_else(|| CaptureError::Platform("Preview has no live video track".to_string()))?;

        let mut tracks = vec![video.clone()];
        let mut dropped = Vec::new();

        if audio.system_audio_enabled {
            match preview.track(TrackKind::SystemAudio).filter(|t| t.live) {
                Some(track) => {
                    tracks.push(track.clone());
                    tracing::info!("Added system audio to recording");
                }
                None => {
                    tracing::warn!("System audio enabled but no live track; recording without it");
                    dropped.push(TrackKind::SystemAudio);
                }
            }
        }

        if audio.microphone_enabled {
            match microphone
                .and_then(|m| m.track(TrackKind::Microphone))
                .filter(|t| t.live)
            {
                Some(track) => {
                    tracks.push(track.clone());
                    tracing::info!("Added microphone to recording");
                }
                None => {
                    tracing::warn!("Microphone enabled but not live; recording without it");
                    dropped.push(TrackKind::Microphone);
                }
            }
        }

        Ok(Composition {
            stream: MediaStream::new(tracks),
            dropped,
        })
    }

    /// Open the configured microphone, falling back to the first enumerated device.
    pub async fn open_microphone(
        &self,
        devices: &dyn DeviceProvider,
        selected: Option<&str>,
    ) -> Result<MicrophoneStream, CaptureError> {
        let available = devices.list_input_devices().await?;
        let device_id = resolve_microphone(selected, &available)
            .ok_or_else(|| CaptureError::DeviceNotFound("No microphones found".to_string()))?;

        tracing::info!("Opening microphone {}", device_id);
        self.backend.open_microphone(&device_id).await
    }
}

/// The selected device, or the first enumerated one when nothing is selected
pub fn resolve_microphone(selected: Option<&str>, devices: &[AudioDeviceInfo]) -> Option<String> {
    match selected {
        Some(id) => Some(id.to_string()),
        None => devices.first().map(|d| d.id.clone()),
    }
}
