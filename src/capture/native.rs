//! Native media backend
//!
//! Microphones come from cpal; each open microphone runs its input stream on
//! a dedicated thread (cpal streams are not `Send`) and feeds a `SampleBuffer`
//! for level metering. Display streams are descriptors only: the ffmpeg
//! encoder opens the actual capture device from the track settings, which
//! carry the source's title and screen bounds.

use super::level::{AudioTap, SampleBuffer};
use super::traits::{ensure_screen_capture, AudioDeviceInfo, CaptureSource, DeviceProvider};
use crate::recorder::ffmpeg::InputPlatform;
use crate::recorder::{
    CaptureError, DisplayRequest, MediaBackend, MediaStream, MediaTrack, MicrophoneStream,
    TrackKind, TrackSettings,
};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// About one second of 48 kHz stereo
const TAP_CAPACITY: usize = 96_000;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// cpal microphones plus display descriptors
#[derive(Default)]
pub struct NativeBackend {
    /// Stop flags of open microphone threads, keyed by stream id
    microphones: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of microphone threads still running
    pub fn open_microphones(&self) -> usize {
        self.microphones.lock().len()
    }
}

fn list_input_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate input devices: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|device| {
            let name = device.name().ok()?;
            let is_default = default_name.as_deref() == Some(name.as_str());
            Some(AudioDeviceInfo {
                id: name.clone(),
                name,
                is_input: true,
                is_default,
            })
        })
        .collect()
}

fn find_input_device(device_id: &str) -> Option<cpal::Device> {
    let host = cpal::default_host();
    host.input_devices()
        .ok()?
        .find(|d| d.name().map(|n| n == device_id).unwrap_or(false))
}

/// Run an input stream for `device_id` until `stop` is set
fn run_microphone(
    device_id: String,
    tap: Arc<SampleBuffer>,
    stop: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), CaptureError>>,
) {
    let stream = match build_input_stream(&device_id, tap) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::Platform(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(STOP_POLL_INTERVAL);
    }
    tracing::debug!("Microphone {} closed", device_id);
}

fn build_input_stream(device_id: &str, tap: Arc<SampleBuffer>) -> Result<cpal::Stream, CaptureError> {
    let device = find_input_device(device_id)
        .ok_or_else(|| CaptureError::DeviceNotFound(device_id.to_string()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::Platform(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config = supported.into();

    let err_fn = |err: cpal::StreamError| {
        tracing::warn!("Microphone stream error: {}", err);
    };

    match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _| tap.push(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _| {
                let samples: Vec<f32> = data.iter().map(|s| *s as f32 / i16::MAX as f32).collect();
                tap.push(&samples);
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _| {
                let samples: Vec<f32> = data
                    .iter()
                    .map(|s| (*s as f32 - 32768.0) / 32768.0)
                    .collect();
                tap.push(&samples);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::Platform(format!(
                "Unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::Platform(e.to_string()))
}

fn find_source<'a>(source_id: &str, sources: &'a [CaptureSource]) -> Option<&'a CaptureSource> {
    sources.iter().find(|s| s.id == source_id)
}

#[async_trait]
impl MediaBackend for NativeBackend {
    async fn open_display(&self, request: &DisplayRequest) -> Result<MediaStream, CaptureError> {
        ensure_screen_capture()?;

        let sources = tokio::task::spawn_blocking(super::list_sources)
            .await
            .map_err(|e| CaptureError::Platform(e.to_string()))?;
        let source = find_source(&request.source_id, &sources)
            .ok_or_else(|| CaptureError::InvalidSource(request.source_id.clone()))?;

        let mut tracks = vec![MediaTrack::new(
            TrackKind::Video,
            source.name.clone(),
            TrackSettings {
                width: Some(request.width),
                height: Some(request.height),
                frame_rate: Some(request.frame_rate),
                source_id: Some(request.source_id.clone()),
                region: source.bounds,
            },
        )];

        if request.system_audio {
            if !InputPlatform::current().has_loopback() {
                return Err(CaptureError::Platform(
                    "System audio capture is not available on this platform".to_string(),
                ));
            }
            tracks.push(MediaTrack::new(
                TrackKind::SystemAudio,
                "System audio",
                TrackSettings {
                    source_id: Some(request.source_id.clone()),
                    ..Default::default()
                },
            ));
        }

        Ok(MediaStream::new(tracks))
    }

    async fn open_microphone(&self, device_id: &str) -> Result<MicrophoneStream, CaptureError> {
        let tap = Arc::new(SampleBuffer::new(TAP_CAPACITY));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_device = device_id.to_string();
        let thread_tap = tap.clone();
        let thread_stop = stop.clone();
        std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || run_microphone(thread_device, thread_tap, thread_stop, ready_tx))
            .map_err(|e| CaptureError::Platform(e.to_string()))?;

        ready_rx
            .await
            .map_err(|_| CaptureError::Platform("Microphone thread exited".to_string()))??;

        let stream = MediaStream::new(vec![MediaTrack::new(
            TrackKind::Microphone,
            device_id,
            TrackSettings {
                source_id: Some(device_id.to_string()),
                ..Default::default()
            },
        )]);
        self.microphones.lock().insert(stream.id.clone(), stop);
        tracing::info!("Microphone {} opened", device_id);

        let tap: Arc<dyn AudioTap> = tap;
        Ok(MicrophoneStream {
            stream,
            tap: Some(tap),
        })
    }

    fn release(&self, stream: &MediaStream) {
        if let Some(stop) = self.microphones.lock().remove(&stream.id) {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl DeviceProvider for NativeBackend {
    async fn list_input_devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        tokio::task::spawn_blocking(list_input_devices)
            .await
            .map_err(|e| CaptureError::Platform(e.to_string()))
    }
}
