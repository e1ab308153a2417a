//! Recording errors
//!
//! Errors returned by the session state machine. State-machine misuse is
//! always reported to the caller; audio and device problems are mostly
//! recovered inside the controller and only surface on the status channel.

use super::media::CaptureError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur during recording
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("No source selected")]
    NoSourceSelected,

    #[error("No supported codec among: {0}")]
    UndeterminedCodec(String),

    #[error("Write error: {0}")]
    WriteError(#[from] StorageError),

    #[error("Audio devices changed: {0}")]
    TransientDeviceChange(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("No unsaved recording")]
    NothingToSave,

    #[error("No recorded data to save")]
    EmptyRecording,
}

impl RecordingError {
    /// Stable code sent to the frontend
    pub fn code(&self) -> &'static str {
        match self {
            RecordingError::PermissionDenied(_) => "PERMISSION_DENIED",
            RecordingError::InvalidSource(_) => "INVALID_SOURCE",
            RecordingError::AlreadyRecording => "ALREADY_RECORDING",
            RecordingError::NotRecording => "NOT_RECORDING",
            RecordingError::NoSourceSelected => "NO_SOURCE_SELECTED",
            RecordingError::UndeterminedCodec(_) => "UNDETERMINED_CODEC",
            RecordingError::WriteError(_) => "WRITE_ERROR",
            RecordingError::TransientDeviceChange(_) => "DEVICE_CHANGED",
            RecordingError::Capture(_) => "CAPTURE_ERROR",
            RecordingError::Encoding(_) => "ENCODING_ERROR",
            RecordingError::NothingToSave => "NOTHING_TO_SAVE",
            RecordingError::EmptyRecording => "EMPTY_RECORDING",
        }
    }
}

impl From<CaptureError> for RecordingError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::PermissionDenied(msg) => RecordingError::PermissionDenied(msg),
            CaptureError::InvalidSource(id) => RecordingError::InvalidSource(id),
            other => RecordingError::Capture(other.to_string()),
        }
    }
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;
