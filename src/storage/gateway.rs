//! Persistence gateway
//!
//! `PersistenceGateway` is the contract the session controller writes
//! through; `FsGateway` implements it on the local filesystem. Writes are
//! never retried here and partial output is left in place on failure.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Folder created under the platform's video directory
pub const DEFAULT_FOLDER_NAME: &str = "Screen Recordings";

/// Persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open {}: {message}", .path.display())]
    Open { path: PathBuf, message: String },

    #[error("No video directory available on this platform")]
    NoVideoDirectory,
}

/// Where a recording ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecording {
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub directory: String,
}

/// `Recording_YYYY-MM-DD_HH-MM-SS.<extension>`
pub fn format_filename<Tz: TimeZone>(time: &DateTime<Tz>, extension: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Recording_{}.{}", time.format("%Y-%m-%d_%H-%M-%S"), extension)
}

/// Durable storage for recorded artifacts
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Create the output directory if missing and return it
    async fn ensure_target_directory(&self) -> Result<PathBuf, StorageError>;

    /// A filename derived from the current time at second resolution
    fn generate_filename(&self, extension: &str) -> String {
        format_filename(&Local::now(), extension)
    }

    /// Write `bytes` to `path`, returning the number of bytes written
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<u64, StorageError>;

    /// Reveal the output directory in the platform file manager
    async fn open_directory(&self) -> Result<(), StorageError>;

    /// Name, write and describe one recording
    async fn save(&self, bytes: &[u8], extension: &str) -> Result<SavedRecording, StorageError> {
        let directory = self.ensure_target_directory().await?;
        let filename = self.generate_filename(extension);
        let path = directory.join(&filename);

        let size = self.write(&path, bytes).await?;
        tracing::info!("Saved {} ({} bytes)", path.display(), size);

        Ok(SavedRecording {
            filename,
            path: path.to_string_lossy().to_string(),
            size,
            directory: directory.to_string_lossy().to_string(),
        })
    }
}

/// Filesystem-backed gateway
#[derive(Debug, Clone)]
pub struct FsGateway {
    directory: PathBuf,
}

impl FsGateway {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `<platform video dir>/<folder_name>`, e.g. `~/Videos/Screen Recordings`
    pub fn default_location(folder_name: &str) -> Result<Self, StorageError> {
        let videos = dirs::video_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Videos")))
            .ok_or(StorageError::NoVideoDirectory)?;
        Ok(Self::new(videos.join(folder_name)))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl PersistenceGateway for FsGateway {
    async fn ensure_target_directory(&self) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| StorageError::Directory {
                path: self.directory.clone(),
                source,
            })?;
        Ok(self.directory.clone())
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<u64, StorageError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(bytes.len() as u64)
    }

    async fn open_directory(&self) -> Result<(), StorageError> {
        let directory = self.ensure_target_directory().await?;

        let opener = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };

        tokio::process::Command::new(opener)
            .arg(&directory)
            .spawn()
            .map_err(|e| StorageError::Open {
                path: directory.clone(),
                message: format!("{} failed: {}", opener, e),
            })?;

        tracing::info!("Opened recordings folder {}", directory.display());
        Ok(())
    }
}
