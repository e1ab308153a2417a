//! Tauri command handlers
//!
//! IPC commands the frontend calls through Tauri's invoke system. Each one
//! forwards to the shared `RecorderService`.

pub mod recording;
pub mod system;
