//! Recording session controller
//!
//! Owns the single `SessionState` and every live stream. All transitions go
//! through `&mut self`, so callers serialize access by holding the controller
//! behind one async mutex; a second `start_recording` therefore always sees
//! the state left by the first.
//!
//! Status updates are broadcast in the order transitions happen. Encoded
//! chunks are drained by one task per recording into the artifact, in the
//! order the encoder produced them.

use super::composer::StreamComposer;
use super::encoder::{negotiate_codec, ChunkReceiver, EncoderAdapter, EncoderSettings};
use super::error::{RecordingError, RecordingResult};
use super::media::{MediaBackend, MediaStream, TrackKind};
use super::quality::{QualityPreset, QualityProfile};
use super::state::{AudioConfiguration, RecordedArtifact, RecordingStatus, SessionState, StatusUpdate};
use crate::capture::{AudioDeviceInfo, CaptureSource, DeviceProvider, LevelMonitor, SourceProvider};
use crate::config::RecorderConfig;
use crate::storage::{PersistenceGateway, SavedRecording};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// External collaborators the controller drives
pub struct Collaborators {
    pub sources: Arc<dyn SourceProvider>,
    pub devices: Arc<dyn DeviceProvider>,
    pub media: Arc<dyn MediaBackend>,
    pub encoder: Box<dyn EncoderAdapter>,
    pub storage: Arc<dyn PersistenceGateway>,
}

struct ActiveMicrophone {
    stream: MediaStream,
    monitor: Option<LevelMonitor>,
}

struct ActiveRecording {
    /// Correlates log lines of one recording
    session_id: Uuid,
    stream: MediaStream,
    artifact: Arc<Mutex<RecordedArtifact>>,
    drain: JoinHandle<()>,
    /// Tells the drain to stop waiting for the encoder and empty the channel
    flush: oneshot::Sender<()>,
    /// Streams the encoder still reads after a refused reroute
    retained: Vec<MediaStream>,
    extension: String,
    started: Instant,
}

/// Artifact kept in memory after a failed write
struct UnsavedArtifact {
    artifact: RecordedArtifact,
    extension: String,
}

/// Manages the preview, microphone and recording lifecycle
pub struct SessionController {
    state: Arc<RwLock<SessionState>>,
    profile: QualityProfile,
    audio: AudioConfiguration,

    composer: StreamComposer,
    sources: Arc<dyn SourceProvider>,
    devices: Arc<dyn DeviceProvider>,
    encoder: Box<dyn EncoderAdapter>,
    storage: Arc<dyn PersistenceGateway>,

    preview: Option<MediaStream>,
    microphone: Option<ActiveMicrophone>,
    recording: Option<ActiveRecording>,
    unsaved: Option<UnsavedArtifact>,

    codec_candidates: Vec<String>,
    chunk_interval: Duration,
    level_interval: Duration,
    audio_bitrate: u32,

    events: broadcast::Sender<StatusUpdate>,
}

impl SessionController {
    pub fn new(collaborators: Collaborators, config: &RecorderConfig) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SessionState::Idle)),
            profile: config.quality.profile(),
            // The microphone is opened on the first explicit toggle
            audio: AudioConfiguration {
                microphone_enabled: false,
                ..config.audio()
            },
            composer: StreamComposer::new(collaborators.media),
            sources: collaborators.sources,
            devices: collaborators.devices,
            encoder: collaborators.encoder,
            storage: collaborators.storage,
            preview: None,
            microphone: None,
            recording: None,
            unsaved: None,
            codec_candidates: config.codec_candidates.clone(),
            chunk_interval: config.chunk_interval(),
            level_interval: config.level_interval(),
            audio_bitrate: config.audio_bitrate,
            events,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Shared read handle for status queries that must not wait on a transition
    pub fn state_handle(&self) -> Arc<RwLock<SessionState>> {
        self.state.clone()
    }

    pub fn status(&self) -> RecordingStatus {
        RecordingStatus::from(&*self.state.read())
    }

    /// Subscribe to status updates
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.events.subscribe()
    }

    pub fn events(&self) -> broadcast::Sender<StatusUpdate> {
        self.events.clone()
    }

    pub fn storage(&self) -> Arc<dyn PersistenceGateway> {
        self.storage.clone()
    }

    pub fn quality(&self) -> QualityProfile {
        self.profile
    }

    pub fn audio(&self) -> &AudioConfiguration {
        &self.audio
    }

    /// The live preview stream, if a source is selected
    pub fn preview(&self) -> Option<&MediaStream> {
        self.preview.as_ref()
    }

    /// The stream currently being encoded
    pub fn recording_stream(&self) -> Option<&MediaStream> {
        self.recording.as_ref().map(|r| &r.stream)
    }

    /// Milliseconds since the current recording started
    pub fn elapsed_ms(&self) -> Option<i64> {
        match &*self.state.read() {
            SessionState::Recording { started_at, .. } => {
                Some((Utc::now() - *started_at).num_milliseconds().max(0))
            }
            _ => None,
        }
    }

    /// Latest microphone level (0-100) while the microphone is monitored
    pub fn audio_level(&self) -> Option<f32> {
        self.microphone
            .as_ref()
            .and_then(|m| m.monitor.as_ref())
            .map(LevelMonitor::level)
    }

    /// Bytes of a recording whose write failed, if any
    pub fn unsaved_bytes(&self) -> Option<u64> {
        self.unsaved.as_ref().map(|u| u.artifact.total_bytes())
    }

    pub async fn list_sources(&self) -> RecordingResult<Vec<CaptureSource>> {
        Ok(self.sources.list_sources().await?)
    }

    pub async fn list_microphones(&self) -> RecordingResult<Vec<AudioDeviceInfo>> {
        Ok(self.devices.list_input_devices().await?)
    }

    fn set_state(&self, next: SessionState, message: impl Into<String>) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        tracing::info!(
            "Session {} -> {}",
            previous.name(),
            self.state.read().name()
        );
        self.notify(message);
    }

    fn notify(&self, message: impl Into<String>) {
        let update = StatusUpdate {
            is_recording: self.state.read().is_recording(),
            message: message.into(),
        };
        // No subscribers is fine
        let _ = self.events.send(update);
    }

    /// Release `stream` unless the running encoder still reads one of its tracks
    fn retire(&mut self, stream: MediaStream) {
        if let Some(active) = self.recording.as_mut() {
            if active.stream.shares_tracks(&stream) {
                tracing::debug!("Keeping stream {} until the recording ends", stream.id);
                active.retained.push(stream);
                return;
            }
        }
        self.composer.backend().release(&stream);
    }

    fn release_preview(&mut self) {
        if let Some(stream) = self.preview.take() {
            self.composer.backend().release(&stream);
        }
    }

    /// Select a capture source and start its preview
    pub async fn select_source(&mut self, source_id: &str) -> RecordingResult<()> {
        if matches!(
            self.state(),
            SessionState::Recording { .. } | SessionState::Saving
        ) {
            return Err(RecordingError::AlreadyRecording);
        }

        let sources = self.sources.list_sources().await?;
        if !sources.iter().any(|s| s.id == source_id) {
            tracing::warn!("Unknown source {}", source_id);
            return Err(RecordingError::InvalidSource(source_id.to_string()));
        }

        let stream = match self
            .composer
            .compose_preview(source_id, &self.profile, &self.audio)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Error starting preview: {}", e);
                self.notify(format!("Error starting preview: {}", e));
                return Err(e.into());
            }
        };

        if let Some(previous) = self.preview.replace(stream) {
            self.composer.backend().release(&previous);
        }

        self.set_state(
            SessionState::Previewing {
                source_id: source_id.to_string(),
            },
            format!("Selected source: {}", source_id),
        );
        Ok(())
    }

    /// Drop the selected source and its preview
    pub fn clear_source(&mut self) -> RecordingResult<()> {
        match self.state() {
            SessionState::Recording { .. } | SessionState::Saving => {
                Err(RecordingError::AlreadyRecording)
            }
            SessionState::Idle => Ok(()),
            SessionState::Previewing { .. } => {
                self.release_preview();
                self.set_state(SessionState::Idle, "Source cleared");
                Ok(())
            }
        }
    }

    /// Compose the final stream and start encoding
    pub async fn start_recording(&mut self) -> RecordingResult<()> {
        let source_id = match self.state() {
            SessionState::Recording { .. } | SessionState::Saving => {
                return Err(RecordingError::AlreadyRecording)
            }
            SessionState::Idle => return Err(RecordingError::NoSourceSelected),
            SessionState::Previewing { source_id } => source_id,
        };
        let Some(preview) = self.preview.as_ref() else {
            return Err(RecordingError::NoSourceSelected);
        };

        let composition = self.composer.compose_recording(
            preview,
            &self.audio,
            self.microphone.as_ref().map(|m| &m.stream),
        )?;

        let codec = negotiate_codec(self.encoder.as_ref(), &self.codec_candidates)?;
        tracing::info!("Using codec: {}", codec.mime_type);

        let mut settings =
            EncoderSettings::new(codec.clone(), &self.profile).with_timeslice(self.chunk_interval);
        settings.audio_bitrate = self.audio_bitrate;

        let chunks = self
            .encoder
            .begin_encoding(&composition.stream, &settings)
            .await?;

        let session_id = Uuid::new_v4();
        let artifact = Arc::new(Mutex::new(RecordedArtifact::new()));
        let (flush, flush_rx) = oneshot::channel();
        let drain = tokio::spawn(drain_chunks(session_id, chunks, artifact.clone(), flush_rx));

        if self.unsaved.take().is_some() {
            tracing::warn!("Discarding unsaved recording from the previous attempt");
        }

        tracing::info!(
            %session_id,
            "Recording {} at {:.1} Mbps ({})",
            source_id,
            self.profile.megabits(),
            self.audio.describe()
        );

        let degraded = composition.is_degraded();
        self.recording = Some(ActiveRecording {
            session_id,
            stream: composition.stream,
            artifact,
            drain,
            flush,
            retained: Vec::new(),
            extension: codec.extension().to_string(),
            started: Instant::now(),
        });

        self.set_state(
            SessionState::Recording {
                source_id: source_id.clone(),
                started_at: Utc::now(),
            },
            format!("Recording started for source: {}", source_id),
        );

        if degraded {
            let dropped: Vec<String> = composition.dropped.iter().map(TrackKind::to_string).collect();
            self.notify(format!("Recording without {}", dropped.join(" and ")));
        }

        Ok(())
    }

    /// Stop encoding, flush chunks and persist the artifact
    ///
    /// Ends in `Previewing` when the preview is still held, otherwise `Idle`.
    /// A failed write ends in `Idle` with the artifact kept for `retry_save`.
    pub async fn stop_recording(&mut self) -> RecordingResult<SavedRecording> {
        let state = self.state();
        if !state.is_recording() {
            return Err(RecordingError::NotRecording);
        }
        let source_id = state.source_id().map(str::to_string);
        let Some(active) = self.recording.take() else {
            return Err(RecordingError::NotRecording);
        };

        self.set_state(SessionState::Saving, "Recording stopped, saving file...");

        let final_chunk = match self.encoder.end_encoding().await {
            Ok(chunk) => chunk,
            Err(e) => {
                // The encoder may still hold its sender; take what is queued and stop there
                tracing::warn!(session_id = %active.session_id, "Encoder did not stop cleanly: {}", e);
                let _ = active.flush.send(());
                None
            }
        };

        if let Err(e) = active.drain.await {
            tracing::warn!("Chunk drain task failed: {}", e);
        }
        for stream in &active.retained {
            self.composer.backend().release(stream);
        }

        let mut artifact = std::mem::take(&mut *active.artifact.lock());
        if let Some(chunk) = final_chunk {
            artifact.push(chunk);
        }

        tracing::info!(
            session_id = %active.session_id,
            "Recording finished after {:.1}s: {} chunks, {} bytes",
            active.started.elapsed().as_secs_f64(),
            artifact.chunk_count(),
            artifact.total_bytes()
        );

        let next = match (&self.preview, source_id) {
            (Some(_), Some(source_id)) => SessionState::Previewing { source_id },
            _ => SessionState::Idle,
        };

        if artifact.total_bytes() == 0 {
            tracing::warn!(session_id = %active.session_id, "Encoder produced no data, nothing saved");
            self.set_state(next, RecordingError::EmptyRecording.to_string());
            return Err(RecordingError::EmptyRecording);
        }

        match self.storage.save(&artifact.concat(), &active.extension).await {
            Ok(saved) => {
                self.set_state(next, format!("Recording saved: {}", saved.filename));
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(session_id = %active.session_id, "Failed to save recording: {}", e);
                self.unsaved = Some(UnsavedArtifact {
                    artifact,
                    extension: active.extension,
                });
                self.release_preview();
                self.set_state(SessionState::Idle, format!("Failed to save recording: {}", e));
                Err(e.into())
            }
        }
    }

    /// Try writing the artifact of the last failed save again
    pub async fn retry_save(&mut self) -> RecordingResult<SavedRecording> {
        let unsaved = self.unsaved.take().ok_or(RecordingError::NothingToSave)?;

        match self
            .storage
            .save(&unsaved.artifact.concat(), &unsaved.extension)
            .await
        {
            Ok(saved) => {
                self.notify(format!("Recording saved: {}", saved.filename));
                Ok(saved)
            }
            Err(e) => {
                self.unsaved = Some(unsaved);
                Err(e.into())
            }
        }
    }

    /// Forget the artifact of the last failed save
    pub fn discard_unsaved(&mut self) -> bool {
        self.unsaved.take().is_some()
    }

    /// Change the quality preset, rebuilding any active stream
    pub async fn set_quality(&mut self, preset: QualityPreset) -> RecordingResult<()> {
        self.profile = preset.profile();
        tracing::info!("Quality set to {}", self.profile.label);
        self.rebuild_active_stream().await
    }

    /// Toggle desktop audio, rebuilding any active stream
    pub async fn set_system_audio(&mut self, enabled: bool) -> RecordingResult<()> {
        self.audio.system_audio_enabled = enabled;
        tracing::info!("System audio {}", if enabled { "enabled" } else { "disabled" });
        self.rebuild_active_stream().await
    }

    /// Toggle the microphone and its level monitor
    pub async fn set_microphone_enabled(&mut self, enabled: bool) -> RecordingResult<()> {
        self.audio.microphone_enabled = enabled;
        if enabled {
            tracing::info!("Microphone enabled");
            self.start_microphone().await;
        } else {
            tracing::info!("Microphone disabled");
            self.stop_microphone();
        }
        self.reroute_recording().await;
        Ok(())
    }

    /// Choose a microphone; `None` means the first available device
    pub async fn select_microphone(&mut self, device_id: Option<String>) -> RecordingResult<()> {
        self.audio.selected_microphone_id = device_id;
        if self.audio.microphone_enabled {
            self.start_microphone().await;
            self.reroute_recording().await;
        }
        Ok(())
    }

    /// React to the device list changing underneath an open microphone
    pub async fn handle_device_change(&mut self, devices: &[AudioDeviceInfo]) {
        let Some(selected) = self.audio.selected_microphone_id.clone() else {
            return;
        };
        if devices.iter().any(|d| d.id == selected) {
            return;
        }

        let change = RecordingError::TransientDeviceChange(format!(
            "microphone {} is no longer available",
            selected
        ));
        tracing::warn!("{}", change);
        self.audio.selected_microphone_id = None;

        if self.audio.microphone_enabled {
            if devices.is_empty() {
                self.stop_microphone();
                self.audio.microphone_enabled = false;
            } else {
                self.start_microphone().await;
            }
            self.reroute_recording().await;
        }

        self.notify(change.to_string());
    }

    /// Stop everything: saves an active recording, releases every stream
    pub async fn shutdown(&mut self) {
        if self.state().is_recording() {
            if let Err(e) = self.stop_recording().await {
                tracing::error!("Failed to finish recording on shutdown: {}", e);
            }
        }
        self.stop_microphone();
        self.release_preview();
        if self.state() != SessionState::Idle {
            self.set_state(SessionState::Idle, "Recorder shut down");
        }
    }

    async fn start_microphone(&mut self) {
        // Never hold two handles to a device
        self.stop_microphone();

        let opened = self
            .composer
            .open_microphone(
                self.devices.as_ref(),
                self.audio.selected_microphone_id.as_deref(),
            )
            .await;

        match opened {
            Ok(mic) => {
                if self.audio.selected_microphone_id.is_none() {
                    self.audio.selected_microphone_id = mic
                        .stream
                        .track(TrackKind::Microphone)
                        .and_then(|t| t.settings.source_id.clone());
                }
                let monitor = mic
                    .tap
                    .map(|tap| LevelMonitor::start(tap, self.level_interval));
                self.microphone = Some(ActiveMicrophone {
                    stream: mic.stream,
                    monitor,
                });
            }
            Err(e) => {
                tracing::warn!("Microphone unavailable, continuing without it: {}", e);
                self.audio.microphone_enabled = false;
                self.notify(format!("Microphone unavailable: {}", e));
            }
        }
    }

    fn stop_microphone(&mut self) {
        if let Some(mic) = self.microphone.take() {
            drop(mic.monitor);
            self.retire(mic.stream);
        }
    }

    async fn rebuild_active_stream(&mut self) -> RecordingResult<()> {
        let Some(source_id) = self.state().source_id().map(str::to_string) else {
            return Ok(());
        };

        let stream = self
            .composer
            .compose_preview(&source_id, &self.profile, &self.audio)
            .await?;
        let previous = self.preview.replace(stream);

        self.reroute_recording().await;

        if let Some(previous) = previous {
            self.retire(previous);
        }
        Ok(())
    }

    /// Point a running encoder at a freshly composed stream
    async fn reroute_recording(&mut self) {
        if self.recording.is_none() {
            return;
        }
        let Some(preview) = self.preview.as_ref() else {
            return;
        };

        let composition = match self.composer.compose_recording(
            preview,
            &self.audio,
            self.microphone.as_ref().map(|m| &m.stream),
        ) {
            Ok(composition) => composition,
            Err(e) => {
                tracing::warn!("Could not recompose recording stream: {}", e);
                return;
            }
        };

        match self.encoder.replace_stream(&composition.stream).await {
            Ok(()) => {
                if let Some(active) = self.recording.as_mut() {
                    active.stream = composition.stream;
                    let retained = std::mem::take(&mut active.retained);
                    for stream in retained {
                        if active.stream.shares_tracks(&stream) {
                            active.retained.push(stream);
                        } else {
                            self.composer.backend().release(&stream);
                        }
                    }
                }
                tracing::info!("Recording input updated");
            }
            Err(e) => {
                tracing::warn!("Encoder kept its previous input: {}", e);
                self.notify(format!("Change applies to the next recording: {}", e));
            }
        }
    }
}

/// Move chunks into `artifact` in arrival order.
///
/// Runs until the encoder drops its sender, or until `flush` fires or is
/// dropped; then whatever is already queued is still taken before returning.
async fn drain_chunks(
    session_id: Uuid,
    mut chunks: ChunkReceiver,
    artifact: Arc<Mutex<RecordedArtifact>>,
    mut flush: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            chunk = chunks.recv() => match chunk {
                Some(chunk) => {
                    tracing::debug!(%session_id, "Recorded chunk: {:.1}KB", chunk.len() as f64 / 1024.0);
                    artifact.lock().push(chunk);
                }
                None => return,
            },
            _ = &mut flush => break,
        }
    }

    chunks.close();
    while let Some(chunk) = chunks.recv().await {
        artifact.lock().push(chunk);
    }
}
