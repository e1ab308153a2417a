//! Windows capture implementations
//!
//! Monitor enumeration through GDI and top-level windows through User32.
//! Windows doesn't require explicit permission for screen capture.

pub mod screen;
pub mod window;

pub use screen::list_displays;
pub use window::list_windows;
