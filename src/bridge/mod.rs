//! UI bridge
//!
//! `RecorderService` exposes the session operations to the UI, and
//! `BridgeRequest`/`BridgeReply` describe them as serializable messages.

pub mod protocol;
pub mod service;

pub use protocol::{BridgeReply, BridgeRequest, StartConfirmation, StopConfirmation};
pub use service::RecorderService;
