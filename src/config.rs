//! Recorder configuration
//!
//! Persisted as JSON in the user's config directory. Every field has a
//! default, so a missing or partial file is valid.

use crate::recorder::encoder::{CHUNK_INTERVAL, DEFAULT_CODEC_CANDIDATES};
use crate::recorder::quality::AUDIO_BITRATE;
use crate::recorder::{AudioConfiguration, QualityPreset};
use crate::storage::{FsGateway, StorageError, DEFAULT_FOLDER_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_DIR_NAME: &str = "screen-recorder";
const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// User-facing recorder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Quality preset selected at startup
    pub quality: QualityPreset,

    pub system_audio: bool,

    pub microphone: bool,

    /// Preferred microphone device id
    pub microphone_id: Option<String>,

    /// Overrides `<video dir>/<folder_name>`
    pub output_dir: Option<PathBuf>,

    pub folder_name: String,

    /// MIME types tried in order when negotiating a codec
    pub codec_candidates: Vec<String>,

    pub chunk_interval_ms: u64,

    pub level_interval_ms: u64,

    pub audio_bitrate: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            quality: QualityPreset::default(),
            system_audio: false,
            microphone: false,
            microphone_id: None,
            output_dir: None,
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            codec_candidates: DEFAULT_CODEC_CANDIDATES.iter().map(|c| c.to_string()).collect(),
            chunk_interval_ms: CHUNK_INTERVAL.as_millis() as u64,
            level_interval_ms: crate::capture::level::LEVEL_INTERVAL.as_millis() as u64,
            audio_bitrate: AUDIO_BITRATE,
        }
    }
}

impl RecorderConfig {
    /// `<config dir>/screen-recorder/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, falling back to defaults when the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.codec_candidates.is_empty() {
            return Err(ConfigError::Invalid("codecCandidates must not be empty".into()));
        }
        if self.chunk_interval_ms == 0 {
            return Err(ConfigError::Invalid("chunkIntervalMs must be positive".into()));
        }
        if self.level_interval_ms == 0 {
            return Err(ConfigError::Invalid("levelIntervalMs must be positive".into()));
        }
        if self.folder_name.trim().is_empty() && self.output_dir.is_none() {
            return Err(ConfigError::Invalid("folderName must not be empty".into()));
        }
        Ok(())
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    pub fn level_interval(&self) -> Duration {
        Duration::from_millis(self.level_interval_ms)
    }

    /// Initial audio configuration
    pub fn audio(&self) -> AudioConfiguration {
        AudioConfiguration {
            system_audio_enabled: self.system_audio,
            microphone_enabled: self.microphone,
            selected_microphone_id: self.microphone_id.clone(),
        }
    }

    /// Gateway writing into the configured output directory
    pub fn gateway(&self) -> Result<FsGateway, StorageError> {
        match &self.output_dir {
            Some(dir) => Ok(FsGateway::new(dir.clone())),
            None => FsGateway::default_location(&self.folder_name),
        }
    }
}
