//! Screen recording (TCC) permission

use crate::recorder::CaptureError;
use core_graphics::access::ScreenCaptureAccess;

const SCREEN_CAPTURE_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture";

pub fn has_screen_recording_permission() -> bool {
    ScreenCaptureAccess::preflight()
}

/// Ask for screen recording access.
///
/// The system prompt only appears once per install; after a refusal the
/// Screen Recording pane is opened so the user can grant it by hand.
pub fn request_screen_recording_permission() -> bool {
    if ScreenCaptureAccess::request() {
        return true;
    }
    open_screen_recording_settings();
    false
}

/// Fail with `PermissionDenied` unless access was already granted
pub fn ensure_screen_capture() -> Result<(), CaptureError> {
    capture_access(has_screen_recording_permission())
}

fn capture_access(granted: bool) -> Result<(), CaptureError> {
    if granted {
        Ok(())
    } else {
        Err(CaptureError::PermissionDenied(
            "Screen recording is disabled in System Settings".to_string(),
        ))
    }
}

fn open_screen_recording_settings() {
    match std::process::Command::new("open")
        .arg(SCREEN_CAPTURE_SETTINGS_URL)
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!("open exited with {} for Screen Recording settings", status),
        Err(e) => tracing::warn!("Failed to open Screen Recording settings: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_access_is_reported_not_requested() {
        assert!(capture_access(true).is_ok());
        assert!(matches!(
            capture_access(false),
            Err(CaptureError::PermissionDenied(_))
        ));
    }
}
