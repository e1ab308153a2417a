//! macOS display enumeration

use crate::capture::traits::CaptureSource;
use crate::recorder::ScreenRegion;
use core_graphics::display::CGDisplay;

/// List active displays as capture sources
///
/// Indices follow `CGGetActiveDisplayList`, which is also the order
/// avfoundation numbers its "Capture screen N" devices in.
pub fn list_displays() -> Vec<CaptureSource> {
    let display_ids = CGDisplay::active_displays().unwrap_or_default();

    display_ids
        .iter()
        .enumerate()
        .map(|(index, &id)| {
            let display = CGDisplay::new(id);
            let bounds = display.bounds();
            let region = ScreenRegion {
                x: bounds.origin.x as i32,
                y: bounds.origin.y as i32,
                width: bounds.size.width as u32,
                height: bounds.size.height as u32,
            };

            let name = if display.is_main() {
                format!("Main Display ({}x{})", region.width, region.height)
            } else {
                format!("Display {}", index + 1)
            };
            CaptureSource::screen(index, name).with_bounds(region)
        })
        .collect()
}
