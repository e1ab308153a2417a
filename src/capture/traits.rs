//! Capture trait definitions
//!
//! Platform-agnostic types and traits for capture sources and audio devices.

use crate::recorder::{CaptureError, ScreenRegion};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether a capture source is a whole screen or a single window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Window,
}

/// A screen or window offered for capture
///
/// Snapshots are immutable; callers re-fetch the list instead of updating one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSource {
    /// Opaque platform id, e.g. `screen:0` or `window:1234`
    pub id: String,

    /// Display or window title
    pub name: String,

    pub kind: SourceKind,

    /// Encoded preview image (PNG/JPEG); empty when the platform offers none
    pub thumbnail: Vec<u8>,

    /// Owning application's icon for window sources
    pub app_icon: Option<Vec<u8>>,

    /// Position and size of a screen on the virtual desktop, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<ScreenRegion>,
}

impl CaptureSource {
    /// Screen number `index` as `screen:<index>`
    pub fn screen(index: usize, name: impl Into<String>) -> Self {
        Self {
            id: format!("screen:{}", index),
            name: name.into(),
            kind: SourceKind::Screen,
            thumbnail: Vec::new(),
            app_icon: None,
            bounds: None,
        }
    }

    /// Top-level window `handle` as `window:<handle>`
    pub fn window(handle: impl std::fmt::Display, title: impl Into<String>) -> Self {
        Self {
            id: format!("window:{}", handle),
            name: title.into(),
            kind: SourceKind::Window,
            thumbnail: Vec::new(),
            app_icon: None,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: ScreenRegion) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Infer the kind from the id prefix
    pub fn kind_of(id: &str) -> Option<SourceKind> {
        match id.split(':').next()? {
            "screen" => Some(SourceKind::Screen),
            "window" => Some(SourceKind::Window),
            _ => None,
        }
    }
}

/// Information about an audio device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is an input device
    pub is_input: bool,

    /// Whether this is the default device
    pub is_default: bool,
}

/// Enumerates screens and windows
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<CaptureSource>, CaptureError>;
}

/// Enumerates microphones
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    async fn list_input_devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError>;
}

/// Source provider backed by the platform's screen and window lists
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplaySourceProvider;

#[async_trait]
impl SourceProvider for DisplaySourceProvider {
    async fn list_sources(&self) -> Result<Vec<CaptureSource>, CaptureError> {
        ensure_screen_capture()?;

        let sources = tokio::task::spawn_blocking(super::list_sources)
            .await
            .map_err(|e| CaptureError::Platform(format!("Display enumeration failed: {}", e)))?;

        tracing::debug!("Found {} sources", sources.len());
        Ok(sources)
    }
}

/// Fail with `PermissionDenied` when the platform blocks screen capture.
///
/// Never prompts; `request_screen_recording_permission` does that.
pub fn ensure_screen_capture() -> Result<(), CaptureError> {
    #[cfg(target_os = "macos")]
    {
        super::macos::ensure_screen_capture()
    }

    #[cfg(not(target_os = "macos"))]
    {
        Ok(())
    }
}

/// Check if screen recording permission is granted
pub fn has_screen_recording_permission() -> bool {
    #[cfg(target_os = "macos")]
    {
        super::macos::has_screen_recording_permission()
    }

    #[cfg(not(target_os = "macos"))]
    {
        // Windows and X11/Wayland prompt at capture time instead
        true
    }
}

/// Request screen recording permission
pub fn request_screen_recording_permission() -> bool {
    #[cfg(target_os = "macos")]
    {
        super::macos::request_screen_recording_permission()
    }

    #[cfg(not(target_os = "macos"))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_id() {
        assert_eq!(CaptureSource::kind_of("screen:0"), Some(SourceKind::Screen));
        assert_eq!(CaptureSource::kind_of("window:1234:0"), Some(SourceKind::Window));
        assert_eq!(CaptureSource::kind_of("camera:1"), None);
    }

    #[test]
    fn test_source_serializes_camel_case() {
        let source = CaptureSource::screen(0, "Primary Display");
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["id"], "screen:0");
        assert_eq!(json["kind"], "screen");
        assert!(json.get("appIcon").is_some());
        assert!(json.get("bounds").is_none());
    }

    #[test]
    fn test_window_source_carries_handle() {
        let source = CaptureSource::window(0x3a00003, "Terminal");
        assert_eq!(source.id, "window:60817411");
        assert_eq!(source.kind, SourceKind::Window);
        assert_eq!(CaptureSource::kind_of(&source.id), Some(SourceKind::Window));
    }
}
