//! FFmpeg encoder adapter
//!
//! Records the composed stream by pointing an ffmpeg child process at the
//! platform's capture devices and reading WebM from its stdout. Bytes are
//! forwarded as one chunk per time slice.

use super::encoder::{Chunk, ChunkReceiver, Codec, EncoderAdapter, EncoderSettings};
use super::error::{RecordingError, RecordingResult};
use super::media::{MediaStream, MediaTrack, ScreenRegion, TrackKind};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 64 * 1024;

const READER_GRACE: Duration = Duration::from_secs(5);

/// Capture device family ffmpeg reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPlatform {
    /// x11grab + PulseAudio
    Linux,
    /// avfoundation
    MacOs,
    /// gdigrab + dshow
    Windows,
}

impl InputPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            InputPlatform::MacOs
        } else if cfg!(target_os = "windows") {
            InputPlatform::Windows
        } else {
            InputPlatform::Linux
        }
    }

    /// Whether desktop audio can be captured without extra drivers
    pub fn has_loopback(&self) -> bool {
        !matches!(self, InputPlatform::MacOs)
    }
}

/// Encoder adapter backed by an ffmpeg child process
pub struct FfmpegEncoder {
    program: PathBuf,
    platform: InputPlatform,
    encoders: HashSet<String>,
    process: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

impl FfmpegEncoder {
    /// Probe `ffmpeg` on PATH for available encoders
    pub async fn probe() -> Self {
        Self::probe_program(PathBuf::from("ffmpeg")).await
    }

    pub async fn probe_program(program: PathBuf) -> Self {
        let encoders = match Command::new(&program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                parse_encoder_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::warn!("ffmpeg -encoders failed with {}", output.status);
                HashSet::new()
            }
            Err(e) => {
                tracing::warn!("ffmpeg not available: {}", e);
                HashSet::new()
            }
        };

        tracing::debug!("ffmpeg offers {} encoders", encoders.len());
        Self::with_encoders(program, encoders)
    }

    pub fn with_encoders(program: PathBuf, encoders: HashSet<String>) -> Self {
        Self {
            program,
            platform: InputPlatform::current(),
            encoders,
            process: None,
            reader: None,
        }
    }

    pub fn platform(&self) -> InputPlatform {
        self.platform
    }
}

#[async_trait]
impl EncoderAdapter for FfmpegEncoder {
    fn is_supported(&self, mime_type: &str) -> bool {
        let codec = Codec::parse(mime_type);
        if !matches!(codec.container.as_str(), "webm" | "x-matroska") {
            return false;
        }
        required_encoders(&codec)
            .iter()
            .all(|name| self.encoders.contains(*name))
    }

    async fn begin_encoding(
        &mut self,
        stream: &MediaStream,
        settings: &EncoderSettings,
    ) -> RecordingResult<ChunkReceiver> {
        if self.process.is_some() {
            return Err(RecordingError::Encoding("ffmpeg is already running".to_string()));
        }

        let args = build_args(self.platform, stream, settings)?;
        tracing::debug!("Starting ffmpeg {}", args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecordingError::Encoding(format!("Failed to start FFmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecordingError::Encoding("FFmpeg stdout unavailable".to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.reader = Some(tokio::spawn(forward_chunks(stdout, tx, settings.timeslice)));
        self.process = Some(child);

        Ok(rx)
    }

    async fn replace_stream(&mut self, _stream: &MediaStream) -> RecordingResult<()> {
        Err(RecordingError::Encoding(
            "ffmpeg cannot switch inputs during a recording".to_string(),
        ))
    }

    async fn end_encoding(&mut self) -> RecordingResult<Option<Chunk>> {
        let mut child = self
            .process
            .take()
            .ok_or_else(|| RecordingError::Encoding("ffmpeg is not running".to_string()))?;

        // "q" asks ffmpeg to finalize the container and exit
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                tracing::warn!("Failed to signal ffmpeg: {}", e);
            }
        }

        let reader = self.reader.take();
        let waited = child.wait().await;
        if let Err(e) = &waited {
            tracing::warn!("Failed to wait for ffmpeg, killing it: {}", e);
            if let Err(e) = child.start_kill() {
                tracing::warn!("Failed to kill ffmpeg: {}", e);
            }
        }

        // The reader ends once ffmpeg closes stdout
        if let Some(mut reader) = reader {
            match tokio::time::timeout(READER_GRACE, &mut reader).await {
                Ok(Err(e)) => tracing::warn!("ffmpeg reader task failed: {}", e),
                Ok(Ok(())) => {}
                Err(_) => {
                    tracing::warn!("ffmpeg output still open after exit, dropping the reader");
                    reader.abort();
                }
            }
        }

        let status = waited
            .map_err(|e| RecordingError::Encoding(format!("Failed to wait for FFmpeg: {}", e)))?;
        if !status.success() {
            tracing::warn!("ffmpeg exited with {}", status);
        }

        // Everything was forwarded by the reader
        Ok(None)
    }
}

/// Read `reader` to the end, sending what accumulated once per `timeslice`
pub async fn forward_chunks<R>(mut reader: R, tx: mpsc::UnboundedSender<Chunk>, timeslice: Duration)
where
    R: AsyncRead + Unpin,
{
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut ticker = tokio::time::interval(timeslice);
    ticker.tick().await;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    tracing::warn!("Error reading encoder output: {}", e);
                    break;
                }
            },
            _ = ticker.tick() => {
                if !pending.is_empty() && tx.send(std::mem::take(&mut pending)).is_err() {
                    return;
                }
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(pending);
    }
}

/// Encoder names from `ffmpeg -encoders` output
pub fn parse_encoder_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            (flags.len() == 6).then(|| name.to_string())
        })
        .collect()
}

fn video_encoder(codec: &Codec) -> &'static str {
    match codec.video_codec() {
        Some("vp9") => "libvpx-vp9",
        Some("av1") => "libaom-av1",
        Some("h264") | Some("avc1") => "libx264",
        _ => "libvpx",
    }
}

fn audio_encoder(codec: &Codec) -> Option<&'static str> {
    match codec.audio_codec() {
        Some("opus") => Some("libopus"),
        Some("vorbis") => Some("libvorbis"),
        Some("aac") => Some("aac"),
        _ => None,
    }
}

/// ffmpeg encoders needed to produce `codec`
pub fn required_encoders(codec: &Codec) -> Vec<&'static str> {
    let mut required = vec![video_encoder(codec)];
    required.extend(audio_encoder(codec));
    required
}

fn source_index(source_id: &str) -> &str {
    source_id.split(':').nth(1).unwrap_or("0")
}

fn video_input_args(
    platform: InputPlatform,
    track: &MediaTrack,
    frame_rate: u32,
) -> RecordingResult<Vec<String>> {
    let source_id = track
        .settings
        .source_id
        .as_deref()
        .ok_or_else(|| RecordingError::Encoding("Video track has no source id".to_string()))?;
    let is_window = source_id.starts_with("window:");
    let rate = frame_rate.to_string();

    let region = track.settings.region.filter(|_| !is_window);

    let args: Vec<String> = match platform {
        InputPlatform::Linux => {
            let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
            let mut args = vec!["-f".into(), "x11grab".into(), "-framerate".into(), rate];
            let input = match region {
                Some(r) => {
                    args.extend(["-video_size".into(), video_size(&r)]);
                    format!("{}+{},{}", display, r.x, r.y)
                }
                None => display,
            };
            if is_window {
                args.extend(["-window_id".into(), source_index(source_id).to_string()]);
            }
            args.extend(["-i".into(), input]);
            args
        }
        InputPlatform::MacOs => {
            if is_window {
                return Err(RecordingError::Capture(
                    "Window capture is not supported by avfoundation".to_string(),
                ));
            }
            vec![
                "-f".into(),
                "avfoundation".into(),
                "-capture_cursor".into(),
                "1".into(),
                "-framerate".into(),
                rate,
                "-i".into(),
                format!("Capture screen {}:none", source_index(source_id)),
            ]
        }
        InputPlatform::Windows => {
            let mut args = vec!["-f".into(), "gdigrab".into(), "-framerate".into(), rate];
            // gdigrab grabs the whole virtual desktop unless cropped to one monitor
            if let Some(r) = region {
                args.extend([
                    "-offset_x".into(),
                    r.x.to_string(),
                    "-offset_y".into(),
                    r.y.to_string(),
                    "-video_size".into(),
                    video_size(&r),
                ]);
            }
            let input = if is_window {
                format!("title={}", track.label)
            } else {
                "desktop".to_string()
            };
            args.extend(["-i".into(), input]);
            args
        }
    };
    Ok(args)
}

fn video_size(region: &ScreenRegion) -> String {
    format!("{}x{}", region.width, region.height)
}

fn audio_input_args(platform: InputPlatform, track: &MediaTrack) -> Option<Vec<String>> {
    let device = track.settings.source_id.clone().unwrap_or_default();

    let args: Vec<&str> = match (platform, track.kind) {
        (InputPlatform::Linux, TrackKind::SystemAudio | TrackKind::Microphone) => vec!["-f", "pulse"],
        (InputPlatform::MacOs, TrackKind::Microphone) => vec!["-f", "avfoundation"],
        (InputPlatform::Windows, _) => vec!["-f", "dshow"],
        _ => return None,
    };

    let input = match (platform, track.kind) {
        (InputPlatform::Linux, TrackKind::SystemAudio) => "@DEFAULT_MONITOR@".to_string(),
        (InputPlatform::Linux, _) => device,
        (InputPlatform::MacOs, _) => format!(":{}", device),
        (InputPlatform::Windows, TrackKind::SystemAudio) => "audio=virtual-audio-capturer".to_string(),
        (InputPlatform::Windows, _) => format!("audio={}", device),
    };

    let mut args: Vec<String> = args.into_iter().map(String::from).collect();
    args.extend(["-i".to_string(), input]);
    Some(args)
}

/// Full ffmpeg command line for one recording
pub fn build_args(
    platform: InputPlatform,
    stream: &MediaStream,
    settings: &EncoderSettings,
) -> RecordingResult<Vec<String>> {
    let video = stream
        .video_track()
        .ok_or_else(|| RecordingError::Encoding("Stream has no video track".to_string()))?;

    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
    args.extend(video_input_args(platform, video, settings.frame_rate)?);

    let audio_codec = audio_encoder(&settings.codec).unwrap_or("libopus");
    let mut audio_inputs = 0;
    for track in stream.audio_tracks() {
        match audio_input_args(platform, track) {
            Some(input) => {
                args.extend(input);
                audio_inputs += 1;
            }
            None => tracing::warn!("No ffmpeg input for {} on this platform, skipping", track.kind),
        }
    }

    args.extend(["-map".into(), "0:v".into()]);
    match audio_inputs {
        0 => {}
        1 => args.extend(["-map".into(), "1:a".into()]),
        n => {
            let inputs: String = (1..=n).map(|i| format!("[{}:a]", i)).collect();
            args.extend([
                "-filter_complex".into(),
                format!("{}amix=inputs={}[aout]", inputs, n),
                "-map".into(),
                "[aout]".into(),
            ]);
        }
    }

    args.extend([
        "-vf".into(),
        format!("scale={}:{}", settings.width, settings.height),
        "-r".into(),
        settings.frame_rate.to_string(),
        "-c:v".into(),
        video_encoder(&settings.codec).to_string(),
        "-b:v".into(),
        settings.video_bitrate.to_string(),
        "-deadline".into(),
        "realtime".into(),
    ]);

    if audio_inputs > 0 {
        args.extend([
            "-c:a".into(),
            audio_codec.to_string(),
            "-b:a".into(),
            settings.audio_bitrate.to_string(),
        ]);
    }

    args.extend([
        "-f".into(),
        "webm".into(),
        "-cluster_time_limit".into(),
        settings.timeslice.as_millis().to_string(),
        "pipe:1".into(),
    ]);

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::media::TrackSettings;
    use crate::recorder::QualityPreset;

    fn screen_track(source_id: &str) -> MediaTrack {
        MediaTrack::new(
            TrackKind::Video,
            "Screen",
            TrackSettings {
                source_id: Some(source_id.into()),
                ..Default::default()
            },
        )
    }

    fn audio_track(kind: TrackKind, device: &str) -> MediaTrack {
        MediaTrack::new(
            kind,
            device,
            TrackSettings {
                source_id: Some(device.into()),
                ..Default::default()
            },
        )
    }

    fn settings(mime: &str) -> EncoderSettings {
        EncoderSettings::new(Codec::parse(mime), &QualityPreset::High.profile())
    }

    const ENCODERS_OUTPUT: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libvpx               libvpx VP8 (codec vp8)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 A....D libopus              libopus Opus (codec opus)
";

    #[test]
    fn test_parse_encoder_list() {
        let encoders = parse_encoder_list(ENCODERS_OUTPUT);
        assert_eq!(encoders.len(), 3);
        assert!(encoders.contains("libvpx-vp9"));
        assert!(!encoders.contains("Video"));
    }

    #[test]
    fn test_supported_codecs_follow_encoders() {
        let encoder = FfmpegEncoder::with_encoders(
            PathBuf::from("ffmpeg"),
            ["libvpx".to_string(), "libopus".to_string()].into_iter().collect(),
        );

        assert!(!encoder.is_supported("video/webm;codecs=vp9,opus"));
        assert!(encoder.is_supported("video/webm;codecs=vp8,opus"));
        assert!(encoder.is_supported("video/webm"));
        assert!(!encoder.is_supported("video/mp4"));
    }

    #[test]
    fn test_required_encoders() {
        let codec = Codec::parse("video/webm;codecs=vp9,opus");
        assert_eq!(required_encoders(&codec), vec!["libvpx-vp9", "libopus"]);
    }

    #[test]
    fn test_linux_args_video_only() {
        let stream = MediaStream::new(vec![screen_track("screen:0")]);
        let args = build_args(InputPlatform::Linux, &stream, &settings("video/webm;codecs=vp9")).unwrap();

        assert!(args.windows(2).any(|w| w == ["-f", "x11grab"]));
        assert!(args.windows(2).any(|w| w == ["-framerate", "60"]));
        assert!(args.windows(2).any(|w| w == ["-vf", "scale=1920:1080"]));
        assert!(args.windows(2).any(|w| w == ["-b:v", "8000000"]));
        assert!(args.windows(2).any(|w| w == ["-cluster_time_limit", "100"]));
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_linux_args_mix_two_audio_tracks() {
        let stream = MediaStream::new(vec![
            screen_track("screen:0"),
            audio_track(TrackKind::SystemAudio, "desktop"),
            audio_track(TrackKind::Microphone, "alsa_input.usb"),
        ]);
        let args = build_args(InputPlatform::Linux, &stream, &settings("video/webm;codecs=vp9,opus")).unwrap();

        assert!(args.iter().any(|a| a == "@DEFAULT_MONITOR@"));
        assert!(args.iter().any(|a| a == "alsa_input.usb"));
        assert!(args.iter().any(|a| a == "[1:a][2:a]amix=inputs=2[aout]"));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libopus"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "128000"]));
    }

    #[test]
    fn test_macos_skips_system_audio() {
        let stream = MediaStream::new(vec![
            screen_track("screen:1"),
            audio_track(TrackKind::SystemAudio, "desktop"),
        ]);
        let args = build_args(InputPlatform::MacOs, &stream, &settings("video/webm")).unwrap();

        assert!(args.iter().any(|a| a == "Capture screen 1:none"));
        assert!(!args.iter().any(|a| a == "1:a"));
    }

    #[test]
    fn test_windows_window_capture_uses_title() {
        let mut track = screen_track("window:777");
        track.label = "Notepad".into();
        let stream = MediaStream::new(vec![track]);
        let args = build_args(InputPlatform::Windows, &stream, &settings("video/webm")).unwrap();

        assert!(args.iter().any(|a| a == "title=Notepad"));
    }

    #[test]
    fn test_windows_screen_is_cropped_to_its_monitor() {
        let mut track = screen_track("screen:1");
        track.settings.region = Some(ScreenRegion {
            x: -1920,
            y: 120,
            width: 1920,
            height: 1080,
        });
        let stream = MediaStream::new(vec![track]);
        let args = build_args(InputPlatform::Windows, &stream, &settings("video/webm")).unwrap();

        let input = args.iter().position(|a| a == "desktop").unwrap();
        let offset_x = args.iter().position(|a| a == "-offset_x").unwrap();
        assert!(offset_x < input);
        assert_eq!(args[offset_x + 1], "-1920");
        assert!(args.windows(2).any(|w| w == ["-offset_y", "120"]));
        assert!(args.windows(2).any(|w| w == ["-video_size", "1920x1080"]));
    }

    #[test]
    fn test_windows_screen_without_bounds_grabs_desktop() {
        let stream = MediaStream::new(vec![screen_track("screen:0")]);
        let args = build_args(InputPlatform::Windows, &stream, &settings("video/webm")).unwrap();

        assert!(args.windows(2).any(|w| w == ["-i", "desktop"]));
        assert!(!args.iter().any(|a| a == "-offset_x"));
    }

    #[tokio::test]
    async fn test_forward_chunks_keeps_every_byte_in_order() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let (tx, mut rx) = mpsc::unbounded_channel();

        forward_chunks(&data[..], tx, Duration::from_millis(5)).await;

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            assert!(!chunk.is_empty());
            received.extend(chunk);
        }
        assert_eq!(received, data);
    }
}
