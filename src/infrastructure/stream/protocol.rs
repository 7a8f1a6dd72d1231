//! Wire formats for the camera-device stream.
//!
//! Commands go out as JSON text messages with deterministically ordered keys
//! (the device firmware does naive string comparison on test fixtures).
//! Status telemetry comes back as JSON text; video arrives as concatenated
//! JPEG images on binary frames.

use serde::{Deserialize, Serialize};

/// First two bytes of every JPEG image (SOI marker).
pub const FRAME_START: [u8; 2] = [0xFF, 0xD8];
/// Last two bytes of every JPEG image (EOI marker).
pub const FRAME_END: [u8; 2] = [0xFF, 0xD9];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    ReqStatus,
    SetRes,
    Reboot,
}

/// Fire-and-forget command to the device. No response correlation.
///
/// Fields are declared in sorted key order; serde_json preserves declaration
/// order, which keeps the serialized keys alphabetical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub action: CommandAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

impl DeviceCommand {
    pub fn request_status() -> Self {
        Self {
            action: CommandAction::ReqStatus,
            height: None,
            width: None,
        }
    }

    pub fn set_resolution(width: u32, height: u32) -> Self {
        Self {
            action: CommandAction::SetRes,
            height: Some(height),
            width: Some(width),
        }
    }

    pub fn reboot() -> Self {
        Self {
            action: CommandAction::Reboot,
            height: None,
            width: None,
        }
    }
}

/// Device telemetry, decoded from status text messages and forwarded to the
/// observer verbatim -- nothing here is persisted by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub battery_level: u8,
    pub is_charging: bool,
    pub network: NetworkInfo,
    /// Seconds since device boot.
    pub uptime: f64,
    pub firmware_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(rename = "signalDBM")]
    pub signal_dbm: i32,
    pub channel: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_with_sorted_keys() {
        let json = serde_json::to_string(&DeviceCommand::set_resolution(1280, 720)).unwrap();
        assert_eq!(json, r#"{"action":"set_res","height":720,"width":1280}"#);

        let json = serde_json::to_string(&DeviceCommand::request_status()).unwrap();
        assert_eq!(json, r#"{"action":"req_status"}"#);

        let json = serde_json::to_string(&DeviceCommand::reboot()).unwrap();
        assert_eq!(json, r#"{"action":"reboot"}"#);
    }

    #[test]
    fn status_message_decodes_exact_wire_fields() {
        let json = r#"{"batteryLevel":80,"isCharging":false,"network":{"signalDBM":-70,"channel":6},"uptime":120.5,"firmwareVersion":"1.2.0"}"#;
        let status: StatusMessage = serde_json::from_str(json).unwrap();

        assert_eq!(status.battery_level, 80);
        assert!(!status.is_charging);
        assert_eq!(status.network.signal_dbm, -70);
        assert_eq!(status.network.channel, 6);
        assert_eq!(status.uptime, 120.5);
        assert_eq!(status.firmware_version, "1.2.0");
    }

    #[test]
    fn status_message_round_trips() {
        let status = StatusMessage {
            battery_level: 42,
            is_charging: true,
            network: NetworkInfo {
                signal_dbm: -60,
                channel: 11,
            },
            uptime: 3.25,
            firmware_version: "2.0.1".to_string(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""signalDBM":-60"#));
        assert_eq!(serde_json::from_str::<StatusMessage>(&json).unwrap(), status);
    }
}
