//! Windows display enumeration using GDI

use crate::capture::traits::CaptureSource;
use crate::recorder::ScreenRegion;
use windows::{
    Win32::Foundation::{BOOL, LPARAM, RECT},
    Win32::Graphics::Gdi::{EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW},
};

const MONITORINFOF_PRIMARY: u32 = 1;

/// List attached monitors as capture sources, in GDI enumeration order
pub fn list_displays() -> Vec<CaptureSource> {
    monitor_handles()
        .into_iter()
        .filter_map(describe_monitor)
        .enumerate()
        .map(|(index, (name, region))| CaptureSource::screen(index, name).with_bounds(region))
        .collect()
}

fn monitor_handles() -> Vec<HMONITOR> {
    unsafe extern "system" fn collect(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let handles = &mut *(lparam.0 as *mut Vec<HMONITOR>);
        handles.push(hmonitor);
        BOOL::from(true)
    }

    let mut handles: Vec<HMONITOR> = Vec::new();
    unsafe {
        let _ = EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(collect),
            LPARAM(&mut handles as *mut Vec<HMONITOR> as isize),
        );
    }
    handles
}

fn describe_monitor(hmonitor: HMONITOR) -> Option<(String, ScreenRegion)> {
    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;

    if !unsafe { GetMonitorInfoW(hmonitor, &mut info.monitorInfo) }.as_bool() {
        tracing::debug!("GetMonitorInfoW failed for {:?}", hmonitor);
        return None;
    }

    let region = monitor_region(&info.monitorInfo.rcMonitor);
    let end = info.szDevice.iter().position(|&c| c == 0).unwrap_or(info.szDevice.len());
    let name = display_name(
        info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
        &region,
        &String::from_utf16_lossy(&info.szDevice[..end]),
    );
    Some((name, region))
}

/// Monitor rectangle in virtual desktop coordinates; secondary monitors may sit at negative offsets
fn monitor_region(rect: &RECT) -> ScreenRegion {
    ScreenRegion {
        x: rect.left,
        y: rect.top,
        width: (rect.right - rect.left).max(0) as u32,
        height: (rect.bottom - rect.top).max(0) as u32,
    }
}

fn display_name(primary: bool, region: &ScreenRegion, device: &str) -> String {
    if primary {
        format!("Primary Display ({}x{})", region.width, region.height)
    } else {
        let device = device.trim_start_matches(r"\\.\");
        format!("{} ({}x{})", device, region.width, region.height)
    }
}
