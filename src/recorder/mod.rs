//! Recording system module
//!
//! - `SessionController` drives the idle → previewing → recording → saving cycle
//! - `StreamComposer` assembles preview and recording streams
//! - `EncoderAdapter` is the contract for turning a stream into chunks;
//!   `FfmpegEncoder` implements it with an ffmpeg child process

pub mod composer;
pub mod coordinator;
pub mod encoder;
pub mod error;
pub mod ffmpeg;
pub mod media;
pub mod quality;
pub mod state;

pub use composer::{Composition, StreamComposer};
pub use coordinator::{Collaborators, SessionController};
pub use encoder::{negotiate_codec, Chunk, ChunkReceiver, Codec, EncoderAdapter, EncoderSettings};
pub use error::{RecordingError, RecordingResult};
pub use ffmpeg::FfmpegEncoder;
pub use media::{
    CaptureError, DisplayRequest, MediaBackend, MediaStream, MediaTrack, MicrophoneStream,
    ScreenRegion, TrackKind, TrackSettings,
};
pub use quality::{QualityPreset, QualityProfile};
pub use state::{AudioConfiguration, RecordedArtifact, RecordingStatus, SessionState, StatusUpdate};
