//! Encoder adapter contract
//!
//! The encoder turns a composed stream into container bytes delivered as an
//! ordered sequence of chunks. Chunks arrive on a channel at a fixed cadence
//! while recording; the receiver yields `None` once `end_encoding` returns.

use super::error::{RecordingError, RecordingResult};
use super::media::MediaStream;
use super::quality::{QualityProfile, AUDIO_BITRATE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Codec candidates in order of preference (quality and compatibility first)
pub const DEFAULT_CODEC_CANDIDATES: [&str; 5] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=vp8",
    "video/webm",
];

/// Default time slice between chunks
pub const CHUNK_INTERVAL: Duration = Duration::from_millis(100);

/// One encoded chunk
pub type Chunk = Vec<u8>;

/// Ordered chunk stream produced by `begin_encoding`
pub type ChunkReceiver = mpsc::UnboundedReceiver<Chunk>;

/// A negotiated codec, parsed from a MIME type like `video/webm;codecs=vp9,opus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Codec {
    pub mime_type: String,
    pub container: String,
    pub codecs: Vec<String>,
}

impl Codec {
    pub fn parse(mime_type: &str) -> Self {
        let mut parts = mime_type.split(';');
        let media = parts.next().unwrap_or_default().trim();
        let container = media
            .split('/')
            .nth(1)
            .unwrap_or(media)
            .trim()
            .to_ascii_lowercase();

        let codecs = parts
            .filter_map(|p| p.trim().strip_prefix("codecs="))
            .flat_map(|list| list.trim_matches('"').split(','))
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            mime_type: mime_type.to_string(),
            container,
            codecs,
        }
    }

    /// File extension for the container
    pub fn extension(&self) -> &str {
        match self.container.as_str() {
            "x-matroska" | "matroska" => "mkv",
            "quicktime" => "mov",
            other => other,
        }
    }

    /// Video codec name, if one was named
    pub fn video_codec(&self) -> Option<&str> {
        self.codecs
            .iter()
            .map(String::as_str)
            .find(|c| matches!(*c, "vp8" | "vp9" | "av1" | "h264" | "avc1"))
    }

    /// Audio codec name, if one was named
    pub fn audio_codec(&self) -> Option<&str> {
        self.codecs
            .iter()
            .map(String::as_str)
            .find(|c| matches!(*c, "opus" | "vorbis" | "aac"))
    }
}

/// Parameters for one encoding run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub video_bitrate: u32,
    pub audio_bitrate: u32,
    pub timeslice: Duration,
}

impl EncoderSettings {
    pub fn new(codec: Codec, profile: &QualityProfile) -> Self {
        Self {
            codec,
            width: profile.width,
            height: profile.height,
            frame_rate: profile.frame_rate,
            video_bitrate: profile.video_bitrate,
            audio_bitrate: AUDIO_BITRATE,
            timeslice: CHUNK_INTERVAL,
        }
    }

    pub fn with_timeslice(mut self, timeslice: Duration) -> Self {
        self.timeslice = timeslice;
        self
    }
}

/// Turns a composed stream into encoded chunks
#[async_trait]
pub trait EncoderAdapter: Send + Sync {
    /// Whether the given MIME type can be produced
    fn is_supported(&self, mime_type: &str) -> bool;

    /// Start encoding. Chunks are delivered in production order on the returned receiver.
    async fn begin_encoding(
        &mut self,
        stream: &MediaStream,
        settings: &EncoderSettings,
    ) -> RecordingResult<ChunkReceiver>;

    /// Swap the input stream of a running encoding without starting a new container.
    async fn replace_stream(&mut self, stream: &MediaStream) -> RecordingResult<()>;

    /// Stop encoding. Returns a trailing chunk if one was held back; after this
    /// call the chunk receiver is closed.
    async fn end_encoding(&mut self) -> RecordingResult<Option<Chunk>>;
}

/// Pick the first supported candidate
pub fn negotiate_codec<S: AsRef<str>>(
    encoder: &dyn EncoderAdapter,
    candidates: &[S],
) -> RecordingResult<Codec> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|mime| encoder.is_supported(mime))
        .map(Codec::parse)
        .ok_or_else(|| {
            let tried: Vec<&str> = candidates.iter().map(AsRef::as_ref).collect();
            RecordingError::UndeterminedCodec(tried.join(", "))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnlySupports(&'static str);

    #[async_trait]
    impl EncoderAdapter for OnlySupports {
        fn is_supported(&self, mime_type: &str) -> bool {
            mime_type == self.0
        }

        async fn begin_encoding(
            &mut self,
            _stream: &MediaStream,
            _settings: &EncoderSettings,
        ) -> RecordingResult<ChunkReceiver> {
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok(rx)
        }

        async fn replace_stream(&mut self, _stream: &MediaStream) -> RecordingResult<()> {
            Ok(())
        }

        async fn end_encoding(&mut self) -> RecordingResult<Option<Chunk>> {
            Ok(None)
        }
    }

    #[test]
    fn test_negotiate_prefers_first_supported() {
        let encoder = OnlySupports("video/webm;codecs=vp8,opus");
        let codec = negotiate_codec(&encoder, &DEFAULT_CODEC_CANDIDATES).unwrap();
        assert_eq!(codec.mime_type, "video/webm;codecs=vp8,opus");
        assert_eq!(codec.video_codec(), Some("vp8"));
        assert_eq!(codec.audio_codec(), Some("opus"));
    }

    #[test]
    fn test_negotiate_none_supported() {
        let encoder = OnlySupports("video/mp4");
        let err = negotiate_codec(&encoder, &DEFAULT_CODEC_CANDIDATES).unwrap_err();
        assert!(matches!(err, RecordingError::UndeterminedCodec(_)));
    }

    #[test]
    fn test_parse_plain_container() {
        let codec = Codec::parse("video/webm");
        assert_eq!(codec.container, "webm");
        assert_eq!(codec.extension(), "webm");
        assert!(codec.codecs.is_empty());
        assert_eq!(codec.video_codec(), None);
    }

    #[test]
    fn test_parse_quoted_codecs() {
        let codec = Codec::parse("video/x-matroska; codecs=\"avc1,opus\"");
        assert_eq!(codec.extension(), "mkv");
        assert_eq!(codec.codecs, vec!["avc1", "opus"]);
    }

    #[test]
    fn test_settings_from_profile() {
        let profile = crate::recorder::QualityPreset::Low.profile();
        let settings = EncoderSettings::new(Codec::parse("video/webm"), &profile);
        assert_eq!(settings.video_bitrate, 2_500_000);
        assert_eq!(settings.audio_bitrate, 128_000);
        assert_eq!(settings.timeslice, Duration::from_millis(100));
    }
}
