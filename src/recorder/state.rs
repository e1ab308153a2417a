//! Recording state management
//!
//! Defines the session state machine values, audio configuration and the
//! in-memory artifact that collects encoded chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current state of the recording session
///
/// The selected source lives inside the state; there is no separate
/// "selected source" field anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    /// Nothing selected
    #[default]
    Idle,
    /// A source is selected and its preview stream is live
    #[serde(rename_all = "camelCase")]
    Previewing { source_id: String },
    /// Encoding the composed stream
    #[serde(rename_all = "camelCase")]
    Recording {
        source_id: String,
        started_at: DateTime<Utc>,
    },
    /// Flushing chunks and writing the artifact
    Saving,
}

impl SessionState {
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording { .. })
    }

    /// Source currently selected, if any
    pub fn source_id(&self) -> Option<&str> {
        match self {
            SessionState::Previewing { source_id } | SessionState::Recording { source_id, .. } => {
                Some(source_id)
            }
            SessionState::Idle | SessionState::Saving => None,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Previewing { .. } => "previewing",
            SessionState::Recording { .. } => "recording",
            SessionState::Saving => "saving",
        }
    }
}

/// Which audio sources to mix into the recording
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfiguration {
    pub system_audio_enabled: bool,
    pub microphone_enabled: bool,
    pub selected_microphone_id: Option<String>,
}

impl AudioConfiguration {
    /// Human readable summary for the status line
    pub fn describe(&self) -> String {
        match (self.system_audio_enabled, self.microphone_enabled) {
            (false, false) => "No audio".to_string(),
            (true, false) => "System".to_string(),
            (false, true) => "Microphone".to_string(),
            (true, true) => "System + Microphone".to_string(),
        }
    }
}

/// Snapshot returned by the status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub is_recording: bool,
    pub source_id: Option<String>,
}

impl From<&SessionState> for RecordingStatus {
    fn from(state: &SessionState) -> Self {
        Self {
            is_recording: state.is_recording(),
            source_id: state.source_id().map(str::to_string),
        }
    }
}

/// Unsolicited status push from the controller to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub is_recording: bool,
    pub message: String,
}

/// Encoded chunks of one recording, in emission order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordedArtifact {
    chunks: Vec<Vec<u8>>,
    total_bytes: u64,
}

impl RecordedArtifact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are ignored.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.total_bytes += chunk.len() as u64;
        self.chunks.push(chunk);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate all chunks in the order they were produced
    pub fn concat(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.total_bytes as usize);
        for chunk in &self.chunks {
            bytes.extend_from_slice(chunk);
        }
        bytes
    }
}
