//! macOS capture implementations
//!
//! Display enumeration through CoreGraphics and the screen recording
//! permission (TCC) preflight.

pub mod permissions;
pub mod screen;

pub use permissions::*;
pub use screen::list_displays;
