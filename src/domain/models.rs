use std::time::Instant;

use uuid::Uuid;

/// Stable identifier for a remote peripheral.
///
/// Devices are always addressed by id; the session never hands out a
/// reference to the underlying transport handle.
pub type DeviceId = Uuid;

/// Connection lifecycle of a single device (or of the stream session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Why the radio reported itself unauthorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationKind {
    /// The user explicitly denied the permission.
    Denied,
    /// Access is restricted by device policy; not user-fixable.
    Restricted,
}

/// Power/authorization state of the BLE radio as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioState {
    /// Resetting, unsupported or otherwise not yet settled.
    #[default]
    Transitional,
    PoweredOff,
    Unauthorized(AuthorizationKind),
    Ready,
}

/// A discovered BLE peripheral as tracked by the registry.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// Signal strength in dBm; more negative is weaker.
    pub rssi: i16,
    pub state: ConnectionState,
    /// Stamped when a connection attempt begins, cleared when the attempt
    /// ends back in `Disconnected`.
    pub last_connection_attempt: Option<Instant>,
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>, rssi: i16) -> Self {
        Self {
            id,
            name: name.into(),
            rssi,
            state: ConnectionState::Disconnected,
            last_connection_attempt: None,
        }
    }
}

/// Discrete events emitted by the BLE session for observers (UI, loggers).
#[derive(Debug, Clone)]
pub enum BleEvent {
    DeviceConnected(DeviceId),
    DeviceDisconnected(DeviceId),
    Log(LogMessage),
}

/// A user-facing status line with a severity, forwarded to whoever renders it.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl LogMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
