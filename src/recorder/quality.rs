//! Quality presets
//!
//! Fixed resolution/frame rate/bitrate bundles offered to the user.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Audio bitrate used for every preset (128 kbps)
pub const AUDIO_BITRATE: u32 = 128_000;

/// Named quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    Medium,
    High,
    Ultra,
}

impl Default for QualityPreset {
    fn default() -> Self {
        Self::High
    }
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 4] = [
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
        QualityPreset::Ultra,
    ];

    /// Resolve the preset to its concrete targets
    pub fn profile(&self) -> QualityProfile {
        match self {
            QualityPreset::Low => QualityProfile {
                preset: *self,
                label: "Low (720p)",
                width: 1280,
                height: 720,
                frame_rate: 30,
                video_bitrate: 2_500_000,
            },
            QualityPreset::Medium => QualityProfile {
                preset: *self,
                label: "Medium (1080p)",
                width: 1920,
                height: 1080,
                frame_rate: 30,
                video_bitrate: 5_000_000,
            },
            QualityPreset::High => QualityProfile {
                preset: *self,
                label: "High (1080p 60fps)",
                width: 1920,
                height: 1080,
                frame_rate: 60,
                video_bitrate: 8_000_000,
            },
            QualityPreset::Ultra => QualityProfile {
                preset: *self,
                label: "Ultra (4K)",
                width: 3840,
                height: 2160,
                frame_rate: 30,
                video_bitrate: 20_000_000,
            },
        }
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityPreset::Low),
            "medium" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            "ultra" => Ok(QualityPreset::Ultra),
            other => Err(format!("Unknown quality preset: {}", other)),
        }
    }
}

/// Resolution, frame rate and bitrate targets of a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub preset: QualityPreset,
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Video bitrate in bits per second
    pub video_bitrate: u32,
}

impl QualityProfile {
    /// Bitrate in Mbps for display
    pub fn megabits(&self) -> f64 {
        self.video_bitrate as f64 / 1_000_000.0
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        QualityPreset::default().profile()
    }
}
