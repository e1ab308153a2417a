//! System-related Tauri commands
//!
//! Permissions and the recordings folder.

use super::recording::RecorderState;
use crate::capture::{has_screen_recording_permission, request_screen_recording_permission};
use crate::utils::ErrorResponse;
use tauri::State;

/// Check if screen recording permission is granted
#[tauri::command]
pub async fn check_screen_permission() -> Result<bool, ErrorResponse> {
    Ok(has_screen_recording_permission())
}

/// Request screen recording permission
#[tauri::command]
pub async fn request_screen_permission() -> Result<bool, ErrorResponse> {
    Ok(request_screen_recording_permission())
}

/// Open the recordings folder in the platform file manager
#[tauri::command]
pub async fn open_recordings_folder(state: State<'_, RecorderState>) -> Result<String, ErrorResponse> {
    state.service.open_output_directory().await
}

/// Path of the recordings folder, created if missing
#[tauri::command]
pub async fn get_recordings_folder(state: State<'_, RecorderState>) -> Result<String, ErrorResponse> {
    state.service.output_directory().await
}
