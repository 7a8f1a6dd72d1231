//! BLE protocol constants for the companion headset.
//!
//! The device advertises the standard Audio Sink service; the same UUID is
//! used to filter the scan and to pick the service to subscribe to after
//! connecting.

use std::time::Duration;
use uuid::Uuid;

/// Audio Sink service (SIG-assigned 16-bit UUID).
pub const SERVICE_UUID_16: u16 = 0x110B;

/// How long a scan cycle runs before discovery is stopped.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(3);

/// Watchdog for a single connection attempt. The underlying stack can hang
/// indefinitely without delivering a failure callback; this bounds the
/// worst case and forces the state machine back to `Disconnected`.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Discoveries weaker than this (exclusive) are treated as noise.
pub const RSSI_FLOOR_DBM: i16 = -100;

/// Upper bound on tracked discoveries; weakest-signal entries are evicted.
pub const REGISTRY_CAPACITY: usize = 10;

/// Device-name keywords the default filter accepts.
pub const DEFAULT_NAME_KEYWORDS: &[&str] = &["audio", "headset"];

/// Expand a 16-bit SIG UUID over the Bluetooth base UUID
/// (`0000xxxx-0000-1000-8000-00805F9B34FB`).
pub fn expand_uuid_16(short: u16) -> Uuid {
    Uuid::from_fields(
        u32::from(short),
        0x0000,
        0x1000,
        &[0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_over_base_uuid() {
        let uuid = expand_uuid_16(SERVICE_UUID_16);
        assert_eq!(
            uuid.to_string(),
            "0000110b-0000-1000-8000-00805f9b34fb"
        );
    }
}
