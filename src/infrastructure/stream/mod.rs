//! WebSocket stream client for the camera device.
//!
//! ## Modules
//!
//! - [`protocol`] - JSON command/status wire formats and JPEG markers
//! - [`frame`] - reassembly of JPEG frames split across binary reads
//! - [`reconnect`] - bounded exponential backoff policy
//! - [`session`] - the socket-owning actor and its observer seam

pub mod frame;
pub mod protocol;
pub mod reconnect;
pub mod session;

pub use frame::FrameReassembler;
pub use protocol::{CommandAction, DeviceCommand, NetworkInfo, StatusMessage};
pub use reconnect::ReconnectPolicy;
pub use session::{
    BinaryMode, StreamConfig, StreamError, StreamObserver, StreamSession, StreamSessionHandle,
    StreamStatus,
};
