//! Session core for a BLE companion device and its camera stream.
//!
//! Two independent session objects make up the public surface:
//!
//! - [`infrastructure::bluetooth::BleSession`] drives the BLE scan and
//!   connection lifecycle over a pluggable transport.
//! - [`infrastructure::stream::StreamSession`] owns a WebSocket connection to
//!   the camera device: command send, status/text dispatch and MJPEG frame
//!   reassembly, with bounded automatic reconnection.
//!
//! Both follow the same shape: an actor task owns all mutable state, commands
//! arrive over an mpsc channel, transport callbacks are marshaled onto the
//! same task, and observable state is published through a `watch` channel
//! that consumers may snapshot from any thread.

pub mod domain;
pub mod infrastructure;

pub use domain::models::{ConnectionState, Device, DeviceId, RadioState};
pub use domain::settings::{Settings, SettingsService};
