//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use screen_recorder_lib::capture::{
    AudioDeviceInfo, AudioTap, CaptureSource, DeviceProvider, SourceKind, SourceProvider,
};
use screen_recorder_lib::config::RecorderConfig;
use screen_recorder_lib::recorder::{
    CaptureError, Chunk, ChunkReceiver, Collaborators, DisplayRequest, EncoderAdapter,
    EncoderSettings, MediaBackend, MediaStream, MediaTrack, MicrophoneStream, RecordingError,
    RecordingResult, SessionController, TrackKind, TrackSettings,
};
use screen_recorder_lib::storage::{PersistenceGateway, StorageError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn screen(id: &str) -> CaptureSource {
    CaptureSource {
        id: id.to_string(),
        name: format!("Display {}", id),
        kind: SourceKind::Screen,
        thumbnail: Vec::new(),
        app_icon: None,
        bounds: None,
    }
}

pub fn microphone(id: &str) -> AudioDeviceInfo {
    AudioDeviceInfo {
        id: id.to_string(),
        name: id.to_string(),
        is_input: true,
        is_default: false,
    }
}

/// Fixed list of capture sources
pub struct FakeSources {
    pub sources: Vec<CaptureSource>,
}

#[async_trait]
impl SourceProvider for FakeSources {
    async fn list_sources(&self) -> Result<Vec<CaptureSource>, CaptureError> {
        Ok(self.sources.clone())
    }
}

/// Microphone list that tests can change
#[derive(Default)]
pub struct FakeDevices {
    pub devices: Mutex<Vec<AudioDeviceInfo>>,
}

impl FakeDevices {
    pub fn set(&self, ids: &[&str]) {
        *self.devices.lock() = ids.iter().map(|id| microphone(id)).collect();
    }
}

#[async_trait]
impl DeviceProvider for FakeDevices {
    async fn list_input_devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        Ok(self.devices.lock().clone())
    }
}

/// Tap that always reports the same amplitude
pub struct ConstantTap(pub f32);

impl AudioTap for ConstantTap {
    fn drain(&self) -> Vec<f32> {
        vec![self.0; 64]
    }
}

/// Media backend tracking every stream it handed out
#[derive(Default)]
pub struct FakeBackend {
    open: Mutex<HashSet<String>>,
    open_mics: Mutex<HashSet<String>>,
    pub display_requests: Mutex<Vec<DisplayRequest>>,
    pub microphone_opens: AtomicUsize,
    pub refuse_system_audio: AtomicBool,
    pub refuse_microphone: AtomicBool,
}

impl FakeBackend {
    /// Streams opened and not yet released
    pub fn open_streams(&self) -> usize {
        self.open.lock().len()
    }

    /// Microphone streams opened and not yet released
    pub fn open_microphones(&self) -> usize {
        self.open_mics.lock().len()
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn open_display(&self, request: &DisplayRequest) -> Result<MediaStream, CaptureError> {
        self.display_requests.lock().push(request.clone());
        if request.system_audio && self.refuse_system_audio.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("system audio".into()));
        }

        let mut tracks = vec![MediaTrack::new(
            TrackKind::Video,
            "screen",
            TrackSettings {
                width: Some(request.width),
                height: Some(request.height),
                frame_rate: Some(request.frame_rate),
                source_id: Some(request.source_id.clone()),
                ..Default::default()
            },
        )];
        if request.system_audio {
            tracks.push(MediaTrack::new(
                TrackKind::SystemAudio,
                "desktop",
                TrackSettings::default(),
            ));
        }

        let stream = MediaStream::new(tracks);
        self.open.lock().insert(stream.id.clone());
        Ok(stream)
    }

    async fn open_microphone(&self, device_id: &str) -> Result<MicrophoneStream, CaptureError> {
        if self.refuse_microphone.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("microphone".into()));
        }
        self.microphone_opens.fetch_add(1, Ordering::SeqCst);

        let stream = MediaStream::new(vec![MediaTrack::new(
            TrackKind::Microphone,
            device_id,
            TrackSettings {
                source_id: Some(device_id.to_string()),
                ..Default::default()
            },
        )]);
        self.open.lock().insert(stream.id.clone());
        self.open_mics.lock().insert(stream.id.clone());

        Ok(MicrophoneStream {
            stream,
            tap: Some(Arc::new(ConstantTap(0.5))),
        })
    }

    fn release(&self, stream: &MediaStream) {
        self.open.lock().remove(&stream.id);
        self.open_mics.lock().remove(&stream.id);
    }
}

/// What the scripted encoder was asked to do
#[derive(Debug, Default)]
pub struct EncoderLog {
    pub begun: Vec<(Vec<TrackKind>, EncoderSettings)>,
    pub replaced: Vec<Vec<TrackKind>>,
    pub ended: usize,
}

/// Encoder emitting a fixed list of chunks as soon as encoding begins
pub struct ScriptedEncoder {
    pub supported: Vec<String>,
    pub chunks: Vec<Chunk>,
    pub final_chunk: Option<Chunk>,
    pub accept_replace: bool,
    /// `end_encoding` fails and keeps its sender open
    pub fail_end: bool,
    pub log: Arc<Mutex<EncoderLog>>,
    sender: Option<mpsc::UnboundedSender<Chunk>>,
}

impl ScriptedEncoder {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            supported: vec!["video/webm;codecs=vp9,opus".to_string()],
            chunks,
            final_chunk: None,
            accept_replace: true,
            fail_end: false,
            log: Arc::new(Mutex::new(EncoderLog::default())),
            sender: None,
        }
    }
}

fn kinds(stream: &MediaStream) -> Vec<TrackKind> {
    stream.tracks.iter().map(|t| t.kind).collect()
}

#[async_trait]
impl EncoderAdapter for ScriptedEncoder {
    fn is_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    async fn begin_encoding(
        &mut self,
        stream: &MediaStream,
        settings: &EncoderSettings,
    ) -> RecordingResult<ChunkReceiver> {
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &self.chunks {
            let _ = tx.send(chunk.clone());
        }
        self.sender = Some(tx);
        self.log.lock().begun.push((kinds(stream), settings.clone()));
        Ok(rx)
    }

    async fn replace_stream(&mut self, stream: &MediaStream) -> RecordingResult<()> {
        if !self.accept_replace {
            return Err(RecordingError::Encoding("inputs are fixed".into()));
        }
        self.log.lock().replaced.push(kinds(stream));
        Ok(())
    }

    async fn end_encoding(&mut self) -> RecordingResult<Option<Chunk>> {
        self.log.lock().ended += 1;
        if self.fail_end {
            return Err(RecordingError::Encoding("encoder hung".into()));
        }
        self.sender = None;
        Ok(self.final_chunk.clone())
    }
}

/// Gateway keeping writes in memory; can be told to fail
#[derive(Default)]
pub struct MemoryGateway {
    pub files: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    pub fail_writes: AtomicBool,
}

impl MemoryGateway {
    pub fn failing() -> Self {
        Self {
            fail_writes: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn ensure_target_directory(&self) -> Result<PathBuf, StorageError> {
        Ok(PathBuf::from("/recordings"))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<u64, StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.files.lock().push((path.to_path_buf(), bytes.to_vec()));
        Ok(bytes.len() as u64)
    }

    async fn open_directory(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Handles to every fake behind one set of collaborators
pub struct Fakes {
    pub backend: Arc<FakeBackend>,
    pub devices: Arc<FakeDevices>,
    pub storage: Arc<MemoryGateway>,
    pub encoder_log: Arc<Mutex<EncoderLog>>,
}

pub fn collaborators(encoder: ScriptedEncoder, storage: MemoryGateway) -> (Collaborators, Fakes) {
    let backend = Arc::new(FakeBackend::default());
    let devices = Arc::new(FakeDevices::default());
    devices.set(&["built-in", "usb-mic"]);
    let storage = Arc::new(storage);
    let encoder_log = encoder.log.clone();

    let collaborators = Collaborators {
        sources: Arc::new(FakeSources {
            sources: vec![screen("screen:0"), screen("screen:1")],
        }),
        devices: devices.clone(),
        media: backend.clone(),
        encoder: Box::new(encoder),
        storage: storage.clone(),
    };

    (
        collaborators,
        Fakes {
            backend,
            devices,
            storage,
            encoder_log,
        },
    )
}

pub fn test_config() -> RecorderConfig {
    RecorderConfig {
        level_interval_ms: 10,
        ..Default::default()
    }
}

/// Controller over the standard fakes, emitting `chunks` per recording
pub fn controller(chunks: Vec<Chunk>) -> (SessionController, Fakes) {
    let (collaborators, fakes) = collaborators(ScriptedEncoder::new(chunks), MemoryGateway::default());
    (SessionController::new(collaborators, &test_config()), fakes)
}

pub fn sized_chunks(sizes: &[usize]) -> Vec<Chunk> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, size)| vec![i as u8 + 1; *size])
        .collect()
}

/// Wait for spawned monitor tasks to tick
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// `Recording_YYYY-MM-DD_HH-MM-SS.<extension>`
pub fn is_recording_filename(name: &str, extension: &str) -> bool {
    let Some(stem) = name
        .strip_prefix("Recording_")
        .and_then(|rest| rest.strip_suffix(&format!(".{}", extension)))
    else {
        return false;
    };
    stem.len() == 19
        && stem.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 | 13 | 16 => b == b'-',
            10 => b == b'_',
            _ => b.is_ascii_digit(),
        })
}
