//! BLE device session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       BleSession                        │
//! │   (actor task - public API via BleSessionHandle)        │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┬────────────┐
//!         ▼             ▼              ▼            ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐
//! │  Filter   │  │  Registry  │  │  Timers  │  │ Protocol │
//! │           │  │            │  │          │  │          │
//! │ - name    │  │ - bounded  │  │ - connect│  │ - UUIDs  │
//! │   keywords│  │   upsert   │  │   watch- │  │ - timing │
//! │ - RSSI    │  │ - eviction │  │   dogs   │  │   consts │
//! └───────────┘  └────────────┘  └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - service UUID expansion and timing constants
//! - [`filter`] - discovery-time name/RSSI filtering
//! - [`registry`] - bounded, de-duplicated discovery collection
//! - [`timers`] - per-device connection watchdogs
//! - [`session`] - the state machine itself and its transport seam

pub mod filter;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod timers;

pub use filter::DeviceFilter;
pub use registry::DeviceRegistry;
pub use session::{
    BleSession, BleSessionConfig, BleSessionHandle, BleSnapshot, BleTransport, PermissionHandler,
    TransportEvent,
};
pub use timers::ConnectionTimers;
