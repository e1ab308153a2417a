//! Capture sources, devices and metering
//!
//! Screen and window enumeration per platform, the provider traits the
//! session controller consumes, and microphone level metering.
//!
//! Sources carry no thumbnail: the UI previews the selected source live.

pub mod level;
pub mod traits;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod x11;

#[cfg(feature = "desktop")]
pub mod native;

pub use level::{AudioTap, LevelMonitor, SampleBuffer};
pub use traits::{
    AudioDeviceInfo, CaptureSource, DeviceProvider, DisplaySourceProvider, SourceKind,
    SourceProvider,
};
pub use traits::{
    ensure_screen_capture, has_screen_recording_permission, request_screen_recording_permission,
};

/// List the displays the platform can capture
pub fn list_displays() -> Vec<CaptureSource> {
    #[cfg(target_os = "macos")]
    {
        macos::list_displays()
    }

    #[cfg(target_os = "windows")]
    {
        windows::list_displays()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        // X11 exposes the whole virtual screen of $DISPLAY as one source
        match std::env::var("DISPLAY") {
            Ok(display) if !display.is_empty() => {
                vec![CaptureSource::screen(0, format!("Screen {}", display))]
            }
            _ => Vec::new(),
        }
    }
}

/// List the top-level windows the platform can capture on their own
pub fn list_windows() -> Vec<CaptureSource> {
    #[cfg(target_os = "macos")]
    {
        // avfoundation only captures whole displays
        Vec::new()
    }

    #[cfg(target_os = "windows")]
    {
        windows::list_windows()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        if list_displays().is_empty() {
            return Vec::new();
        }
        x11::list_windows()
    }
}

/// Screens first, then windows
pub fn list_sources() -> Vec<CaptureSource> {
    let mut sources = list_displays();
    sources.extend(list_windows());
    sources
}
