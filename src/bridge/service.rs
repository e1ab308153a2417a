//! Recorder service
//!
//! The request/response surface the UI talks to. Every transition goes
//! through the one controller mutex; the status query reads the shared state
//! without waiting for a transition in flight.

use super::protocol::{BridgeReply, BridgeRequest, StartConfirmation, StopConfirmation};
use crate::capture::{AudioDeviceInfo, CaptureSource};
use crate::config::RecorderConfig;
use crate::recorder::{
    Collaborators, QualityPreset, QualityProfile, RecordingError, RecordingStatus,
    SessionController, SessionState, StatusUpdate,
};
use crate::storage::{PersistenceGateway, SavedRecording};
use crate::utils::ErrorResponse;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Extension used for artifacts handed in over the bridge
const ARTIFACT_EXTENSION: &str = "webm";

type BridgeResult<T> = Result<T, ErrorResponse>;

/// Shared handle to the recording session
#[derive(Clone)]
pub struct RecorderService {
    controller: Arc<Mutex<SessionController>>,
    state: Arc<RwLock<SessionState>>,
    events: broadcast::Sender<StatusUpdate>,
    storage: Arc<dyn PersistenceGateway>,
}

impl RecorderService {
    /// Build the controller and apply the startup audio configuration
    pub async fn new(collaborators: Collaborators, config: &RecorderConfig) -> Self {
        let mut controller = SessionController::new(collaborators, config);
        if config.microphone {
            if let Err(e) = controller.set_microphone_enabled(true).await {
                tracing::warn!("Could not enable microphone at startup: {}", e);
            }
        }

        Self {
            state: controller.state_handle(),
            events: controller.events(),
            storage: controller.storage(),
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    /// Direct access to the controller for operations not exposed here
    pub fn controller(&self) -> Arc<Mutex<SessionController>> {
        self.controller.clone()
    }

    /// Subscribe to unsolicited status pushes
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.events.subscribe()
    }

    pub async fn list_sources(&self) -> BridgeResult<Vec<CaptureSource>> {
        let controller = self.controller.lock().await;
        controller.list_sources().await.map_err(|e| {
            tracing::error!("Error getting sources: {}", e);
            e.into()
        })
    }

    pub async fn select_source(&self, source_id: &str) -> BridgeResult<RecordingStatus> {
        let mut controller = self.controller.lock().await;
        controller.select_source(source_id).await?;
        Ok(controller.status())
    }

    /// Start recording `source_id`, selecting it first when it isn't previewed
    pub async fn start_recording(&self, source_id: Option<String>) -> BridgeResult<StartConfirmation> {
        let mut controller = self.controller.lock().await;

        let state = controller.state();
        if matches!(state, SessionState::Recording { .. } | SessionState::Saving) {
            return Err(RecordingError::AlreadyRecording.into());
        }
        let Some(source_id) = source_id else {
            return Err(RecordingError::NoSourceSelected.into());
        };

        if state.source_id() != Some(source_id.as_str()) {
            controller.select_source(&source_id).await?;
        }
        controller.start_recording().await?;

        Ok(StartConfirmation {
            message: "Recording started successfully".to_string(),
            source_id,
        })
    }

    pub async fn stop_recording(&self) -> BridgeResult<StopConfirmation> {
        let mut controller = self.controller.lock().await;
        let saved = controller.stop_recording().await?;
        Ok(StopConfirmation {
            message: "Recording stopped successfully".to_string(),
            saved,
        })
    }

    /// Current status; never waits on a transition
    pub fn status(&self) -> RecordingStatus {
        RecordingStatus::from(&*self.state.read())
    }

    /// Write bytes recorded elsewhere into the output directory
    pub async fn save_artifact(&self, bytes: Vec<u8>) -> BridgeResult<SavedRecording> {
        if bytes.is_empty() {
            return Err(RecordingError::EmptyRecording.into());
        }
        self.storage
            .save(&bytes, ARTIFACT_EXTENSION)
            .await
            .map_err(|e| {
                tracing::error!("Error saving recording: {}", e);
                e.into()
            })
    }

    pub async fn open_output_directory(&self) -> BridgeResult<String> {
        self.storage.open_directory().await?;
        Ok("Opened recordings folder".to_string())
    }

    pub async fn output_directory(&self) -> BridgeResult<String> {
        let directory = self.storage.ensure_target_directory().await?;
        Ok(directory.to_string_lossy().to_string())
    }

    pub async fn set_quality(&self, preset: QualityPreset) -> BridgeResult<()> {
        Ok(self.controller.lock().await.set_quality(preset).await?)
    }

    pub async fn set_system_audio(&self, enabled: bool) -> BridgeResult<()> {
        Ok(self.controller.lock().await.set_system_audio(enabled).await?)
    }

    pub async fn set_microphone_enabled(&self, enabled: bool) -> BridgeResult<()> {
        Ok(self
            .controller
            .lock()
            .await
            .set_microphone_enabled(enabled)
            .await?)
    }

    pub async fn select_microphone(&self, device_id: Option<String>) -> BridgeResult<()> {
        Ok(self
            .controller
            .lock()
            .await
            .select_microphone(device_id)
            .await?)
    }

    pub async fn list_microphones(&self) -> BridgeResult<Vec<AudioDeviceInfo>> {
        Ok(self.controller.lock().await.list_microphones().await?)
    }

    pub fn quality_presets(&self) -> Vec<QualityProfile> {
        QualityPreset::ALL.iter().map(QualityPreset::profile).collect()
    }

    pub async fn audio_level(&self) -> Option<f32> {
        self.controller.lock().await.audio_level()
    }

    pub async fn elapsed_ms(&self) -> Option<i64> {
        self.controller.lock().await.elapsed_ms()
    }

    pub async fn retry_save(&self) -> BridgeResult<SavedRecording> {
        Ok(self.controller.lock().await.retry_save().await?)
    }

    pub async fn discard_unsaved(&self) -> bool {
        self.controller.lock().await.discard_unsaved()
    }

    pub async fn handle_device_change(&self, devices: &[AudioDeviceInfo]) {
        self.controller.lock().await.handle_device_change(devices).await;
    }

    pub async fn shutdown(&self) {
        self.controller.lock().await.shutdown().await;
    }

    /// Dispatch one protocol request
    pub async fn handle(&self, request: BridgeRequest) -> BridgeReply {
        tracing::debug!("Bridge request: {:?}", RequestName(&request));

        match request {
            BridgeRequest::ListSources => self.list_sources().await.map(BridgeReply::Sources).into(),
            BridgeRequest::SelectSource { source_id } => self.select_source(&source_id).await.into(),
            BridgeRequest::StartRecording { source_id } => self.start_recording(source_id).await.into(),
            BridgeRequest::StopRecording => self.stop_recording().await.into(),
            BridgeRequest::GetStatus => BridgeReply::Status(self.status()),
            BridgeRequest::SaveArtifact { bytes } => self.save_artifact(bytes).await.into(),
            BridgeRequest::OpenOutputDirectory => self
                .open_output_directory()
                .await
                .map(BridgeReply::Message)
                .into(),
            BridgeRequest::GetOutputDirectory => self
                .output_directory()
                .await
                .map(BridgeReply::Directory)
                .into(),
            BridgeRequest::SetQuality { preset } => self.set_quality(preset).await.into(),
            BridgeRequest::SetSystemAudio { enabled } => self.set_system_audio(enabled).await.into(),
            BridgeRequest::SetMicrophone { enabled } => self.set_microphone_enabled(enabled).await.into(),
            BridgeRequest::SelectMicrophone { device_id } => self.select_microphone(device_id).await.into(),
            BridgeRequest::ListMicrophones => self
                .list_microphones()
                .await
                .map(BridgeReply::Microphones)
                .into(),
            BridgeRequest::ListQualityPresets => BridgeReply::QualityPresets(self.quality_presets()),
            BridgeRequest::GetAudioLevel => BridgeReply::Level(self.audio_level().await),
            BridgeRequest::GetElapsed => BridgeReply::Elapsed(self.elapsed_ms().await),
            BridgeRequest::RetrySave => self.retry_save().await.into(),
            BridgeRequest::DiscardUnsaved => BridgeReply::Discarded(self.discard_unsaved().await),
        }
    }
}

/// Logs a request without dumping artifact bytes
struct RequestName<'a>(&'a BridgeRequest);

impl std::fmt::Debug for RequestName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            BridgeRequest::SaveArtifact { bytes } => write!(f, "SaveArtifact({} bytes)", bytes.len()),
            other => write!(f, "{:?}", other),
        }
    }
}
