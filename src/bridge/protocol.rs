//! Bridge protocol definitions
//!
//! Request and reply messages exchanged between the UI and the recorder
//! service. Any transport that can carry JSON can carry these.

use crate::capture::{AudioDeviceInfo, CaptureSource};
use crate::recorder::{QualityPreset, QualityProfile, RecordingStatus};
use crate::storage::SavedRecording;
use crate::utils::ErrorResponse;
use serde::{Deserialize, Serialize};

/// Requests the UI can send to the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum BridgeRequest {
    ListSources,
    #[serde(rename_all = "camelCase")]
    SelectSource { source_id: String },
    #[serde(rename_all = "camelCase")]
    StartRecording { source_id: Option<String> },
    StopRecording,
    GetStatus,
    /// Persist bytes recorded elsewhere
    SaveArtifact { bytes: Vec<u8> },
    OpenOutputDirectory,
    GetOutputDirectory,
    SetQuality { preset: QualityPreset },
    SetSystemAudio { enabled: bool },
    SetMicrophone { enabled: bool },
    #[serde(rename_all = "camelCase")]
    SelectMicrophone { device_id: Option<String> },
    ListMicrophones,
    ListQualityPresets,
    GetAudioLevel,
    GetElapsed,
    RetrySave,
    DiscardUnsaved,
}

impl BridgeRequest {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }
}

/// Reply to a successful `start-recording`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConfirmation {
    pub message: String,
    pub source_id: String,
}

/// Reply to a successful `stop-recording`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopConfirmation {
    pub message: String,
    pub saved: SavedRecording,
}

/// Replies sent back to the UI
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum BridgeReply {
    /// Simple acknowledgment
    Ok,
    Sources(Vec<CaptureSource>),
    Microphones(Vec<AudioDeviceInfo>),
    QualityPresets(Vec<QualityProfile>),
    Started(StartConfirmation),
    Stopped(StopConfirmation),
    Status(RecordingStatus),
    Saved(SavedRecording),
    Directory(String),
    Message(String),
    Level(Option<f32>),
    Elapsed(Option<i64>),
    Discarded(bool),
    Error(ErrorResponse),
}

impl BridgeReply {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BridgeReply::Error(_))
    }
}

impl<T: Into<BridgeReply>> From<Result<T, ErrorResponse>> for BridgeReply {
    fn from(result: Result<T, ErrorResponse>) -> Self {
        match result {
            Ok(reply) => reply.into(),
            Err(error) => BridgeReply::Error(error),
        }
    }
}

impl From<()> for BridgeReply {
    fn from(_: ()) -> Self {
        BridgeReply::Ok
    }
}

impl From<RecordingStatus> for BridgeReply {
    fn from(status: RecordingStatus) -> Self {
        BridgeReply::Status(status)
    }
}

impl From<StartConfirmation> for BridgeReply {
    fn from(confirmation: StartConfirmation) -> Self {
        BridgeReply::Started(confirmation)
    }
}

impl From<StopConfirmation> for BridgeReply {
    fn from(confirmation: StopConfirmation) -> Self {
        BridgeReply::Stopped(confirmation)
    }
}

impl From<SavedRecording> for BridgeReply {
    fn from(saved: SavedRecording) -> Self {
        BridgeReply::Saved(saved)
    }
}
