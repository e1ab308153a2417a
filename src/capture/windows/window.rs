//! Top-level window enumeration

use crate::capture::traits::CaptureSource;
use windows::{
    Win32::Foundation::{BOOL, HWND, LPARAM},
    Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextLengthW, GetWindowTextW, IsWindowVisible,
    },
};

/// Visible, titled top-level windows in Z order
///
/// gdigrab selects windows by title, so untitled ones are left out.
pub fn list_windows() -> Vec<CaptureSource> {
    unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let sources = &mut *(lparam.0 as *mut Vec<CaptureSource>);
        if IsWindowVisible(hwnd).as_bool() {
            if let Some(source) = window_source(hwnd.0 as isize, &window_title(hwnd)) {
                sources.push(source);
            }
        }
        BOOL::from(true)
    }

    let mut sources: Vec<CaptureSource> = Vec::new();
    if let Err(e) = unsafe {
        EnumWindows(
            Some(collect),
            LPARAM(&mut sources as *mut Vec<CaptureSource> as isize),
        )
    } {
        tracing::warn!("EnumWindows failed: {}", e);
    }
    sources
}

fn window_title(hwnd: HWND) -> String {
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u16; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..copied.max(0) as usize])
}

fn window_source(handle: isize, title: &str) -> Option<CaptureSource> {
    let title = title.trim();
    (!title.is_empty()).then(|| CaptureSource::window(handle, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SourceKind;

    #[test]
    fn test_untitled_windows_are_skipped() {
        assert!(window_source(42, "   ").is_none());

        let source = window_source(42, " Notepad ").unwrap();
        assert_eq!(source.id, "window:42");
        assert_eq!(source.name, "Notepad");
        assert_eq!(source.kind, SourceKind::Window);
    }
}
