//! Recording-related Tauri commands

use crate::bridge::{RecorderService, StartConfirmation, StopConfirmation};
use crate::capture::{AudioDeviceInfo, CaptureSource};
use crate::recorder::{QualityPreset, QualityProfile, RecordingStatus};
use crate::storage::SavedRecording;
use crate::utils::ErrorResponse;
use tauri::State;

/// Application state for recording
pub struct RecorderState {
    pub service: RecorderService,
}

/// Get the screens and windows available for capture
#[tauri::command]
pub async fn get_sources(state: State<'_, RecorderState>) -> Result<Vec<CaptureSource>, ErrorResponse> {
    state.service.list_sources().await
}

/// Select a source and start its preview
#[tauri::command]
pub async fn select_source(
    state: State<'_, RecorderState>,
    source_id: String,
) -> Result<RecordingStatus, ErrorResponse> {
    state.service.select_source(&source_id).await
}

/// Start recording
#[tauri::command]
pub async fn start_recording(
    state: State<'_, RecorderState>,
    source_id: Option<String>,
) -> Result<StartConfirmation, ErrorResponse> {
    state.service.start_recording(source_id).await
}

/// Stop recording and save the file
#[tauri::command]
pub async fn stop_recording(state: State<'_, RecorderState>) -> Result<StopConfirmation, ErrorResponse> {
    state.service.stop_recording().await
}

/// Get current recording status
#[tauri::command]
pub fn get_recording_status(state: State<'_, RecorderState>) -> RecordingStatus {
    state.service.status()
}

/// Get milliseconds since the current recording started
#[tauri::command]
pub async fn get_recording_duration(state: State<'_, RecorderState>) -> Result<Option<i64>, ErrorResponse> {
    Ok(state.service.elapsed_ms().await)
}

/// Save bytes recorded by the frontend
#[tauri::command]
pub async fn save_recording(
    state: State<'_, RecorderState>,
    buffer: Vec<u8>,
) -> Result<SavedRecording, ErrorResponse> {
    state.service.save_artifact(buffer).await
}

/// Retry writing a recording whose save failed
#[tauri::command]
pub async fn retry_save(state: State<'_, RecorderState>) -> Result<SavedRecording, ErrorResponse> {
    state.service.retry_save().await
}

#[tauri::command]
pub async fn discard_unsaved(state: State<'_, RecorderState>) -> Result<bool, ErrorResponse> {
    Ok(state.service.discard_unsaved().await)
}

#[tauri::command]
pub fn get_quality_presets(state: State<'_, RecorderState>) -> Vec<QualityProfile> {
    state.service.quality_presets()
}

#[tauri::command]
pub async fn set_quality(
    state: State<'_, RecorderState>,
    preset: QualityPreset,
) -> Result<(), ErrorResponse> {
    state.service.set_quality(preset).await
}

#[tauri::command]
pub async fn set_system_audio(
    state: State<'_, RecorderState>,
    enabled: bool,
) -> Result<(), ErrorResponse> {
    state.service.set_system_audio(enabled).await
}

#[tauri::command]
pub async fn set_microphone(
    state: State<'_, RecorderState>,
    enabled: bool,
) -> Result<(), ErrorResponse> {
    state.service.set_microphone_enabled(enabled).await
}

/// Choose a microphone; `None` picks the first available one
#[tauri::command]
pub async fn select_microphone(
    state: State<'_, RecorderState>,
    device_id: Option<String>,
) -> Result<(), ErrorResponse> {
    state.service.select_microphone(device_id).await
}

/// Get list of available audio input devices (microphones)
#[tauri::command]
pub async fn get_audio_devices(state: State<'_, RecorderState>) -> Result<Vec<AudioDeviceInfo>, ErrorResponse> {
    let devices = state.service.list_microphones().await?;
    // Keep the selection valid when a device disappeared since the last look
    state.service.handle_device_change(&devices).await;
    Ok(devices)
}

/// Current microphone level, 0-100
#[tauri::command]
pub async fn get_audio_level(state: State<'_, RecorderState>) -> Result<Option<f32>, ErrorResponse> {
    Ok(state.service.audio_level().await)
}
