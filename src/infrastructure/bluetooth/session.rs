//! BLE session state machine.
//!
//! An actor task owns the registry, the per-device watchdog timers and the
//! transport handle. Commands from the UI and callbacks from the radio stack
//! are both funneled onto the task's channel loop, so every state mutation
//! happens on one serial context. Observers read a cloned snapshot through a
//! `watch` channel and receive discrete events over mpsc.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::domain::models::{
    AuthorizationKind, BleEvent, ConnectionState, Device, DeviceId, LogMessage, MessageSeverity,
    RadioState,
};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::filter::DeviceFilter;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::registry::DeviceRegistry;
use crate::infrastructure::bluetooth::timers::ConnectionTimers;

/// Operations the session issues against the radio stack.
///
/// Implementations must not block; results come back asynchronously as
/// [`TransportEvent`]s on the channel handed to [`BleSession::spawn`].
pub trait BleTransport: Send + 'static {
    fn start_discovery(&mut self, service: Uuid);
    fn stop_discovery(&mut self);
    fn connect(&mut self, id: DeviceId);
    /// Explicit connection cancel. Also used by the watchdog: the stack may
    /// hang forever without delivering a failure callback, so timeouts issue
    /// this to force a known state.
    fn cancel_connection(&mut self, id: DeviceId);
    fn subscribe_notifications(&mut self, id: DeviceId, service: Uuid);
}

/// Asynchronous callbacks from the radio stack.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    RadioState(RadioState),
    Discovered {
        id: DeviceId,
        name: String,
        rssi: i16,
    },
    Connected(DeviceId),
    ConnectFailed {
        id: DeviceId,
        reason: String,
    },
    Disconnected {
        id: DeviceId,
        reason: Option<String>,
    },
}

/// Collaborator that owns the permission-prompt UX. Only radio-off and
/// explicit user denial are surfaced; everything else is logged.
pub trait PermissionHandler: Send + 'static {
    fn on_radio_unauthorized(&mut self);
    fn on_radio_powered_off(&mut self);
}

#[derive(Debug, Clone)]
pub struct BleSessionConfig {
    pub scan_timeout: Duration,
    pub connect_timeout: Duration,
    pub filter: DeviceFilter,
    pub registry_capacity: usize,
    pub service_uuid: Uuid,
}

impl Default for BleSessionConfig {
    fn default() -> Self {
        Self {
            scan_timeout: protocol::SCAN_TIMEOUT,
            connect_timeout: protocol::CONNECT_TIMEOUT,
            filter: DeviceFilter::default(),
            registry_capacity: protocol::REGISTRY_CAPACITY,
            service_uuid: protocol::expand_uuid_16(protocol::SERVICE_UUID_16),
        }
    }
}

impl From<&Settings> for BleSessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            scan_timeout: Duration::from_millis(settings.scan_timeout_ms),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            filter: DeviceFilter::new(&settings.device_name_keywords, settings.rssi_floor_dbm),
            registry_capacity: settings.registry_capacity,
            service_uuid: protocol::expand_uuid_16(settings.ble_service_uuid),
        }
    }
}

/// Observable session state, published after every mutation.
#[derive(Debug, Clone, Default)]
pub struct BleSnapshot {
    pub scanning: bool,
    pub radio: RadioState,
    pub devices: Vec<Device>,
}

enum BleCommand {
    StartScan,
    StopScan,
    Toggle(DeviceId),
    Shutdown,
}

/// Cloneable handle to a running [`BleSession`] task.
#[derive(Clone)]
pub struct BleSessionHandle {
    cmd_tx: mpsc::UnboundedSender<BleCommand>,
    state_rx: watch::Receiver<BleSnapshot>,
}

impl BleSessionHandle {
    pub fn start_scan(&self) {
        let _ = self.cmd_tx.send(BleCommand::StartScan);
    }

    pub fn stop_scan(&self) {
        let _ = self.cmd_tx.send(BleCommand::StopScan);
    }

    /// Single entry point for both connect and disconnect: a disconnected
    /// device begins a connection attempt, anything else is torn down.
    pub fn toggle_connection(&self, id: DeviceId) {
        let _ = self.cmd_tx.send(BleCommand::Toggle(id));
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(BleCommand::Shutdown);
    }

    pub fn snapshot(&self) -> BleSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<BleSnapshot> {
        self.state_rx.clone()
    }
}

pub struct BleSession<T, P> {
    config: BleSessionConfig,
    transport: T,
    permissions: P,
    registry: DeviceRegistry,
    timers: ConnectionTimers,
    radio: RadioState,
    scanning: bool,
    scan_deadline: Option<Instant>,
    cmd_rx: mpsc::UnboundedReceiver<BleCommand>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    timeout_rx: mpsc::UnboundedReceiver<DeviceId>,
    state_tx: watch::Sender<BleSnapshot>,
    event_tx: mpsc::UnboundedSender<BleEvent>,
}

impl<T: BleTransport, P: PermissionHandler> BleSession<T, P> {
    /// Spawns the session task. Transport callbacks arrive on `transport_rx`
    /// and are processed in arrival order.
    pub fn spawn(
        config: BleSessionConfig,
        transport: T,
        permissions: P,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> (BleSessionHandle, mpsc::UnboundedReceiver<BleEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(BleSnapshot::default());
        let (timers, timeout_rx) = ConnectionTimers::new();

        let session = Self {
            registry: DeviceRegistry::new(config.registry_capacity),
            config,
            transport,
            permissions,
            timers,
            radio: RadioState::Transitional,
            scanning: false,
            scan_deadline: None,
            cmd_rx,
            transport_rx,
            timeout_rx,
            state_tx,
            event_tx,
        };
        tokio::spawn(session.run());

        (BleSessionHandle { cmd_tx, state_rx }, event_rx)
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(BleCommand::StartScan) => self.handle_start_scan(),
                    Some(BleCommand::StopScan) => self.handle_stop_scan(),
                    Some(BleCommand::Toggle(id)) => self.handle_toggle(id),
                    Some(BleCommand::Shutdown) | None => break,
                },
                Some(event) = self.transport_rx.recv() => self.handle_transport_event(event),
                Some(id) = self.timeout_rx.recv() => self.handle_connect_timeout(id),
                _ = tokio::time::sleep_until(self.scan_deadline.unwrap_or_else(Instant::now)),
                    if self.scan_deadline.is_some() =>
                {
                    debug!("Scan window elapsed");
                    self.handle_stop_scan();
                }
            }
        }

        self.timers.clear();
        if self.scanning {
            self.transport.stop_discovery();
        }
        debug!("BLE session task exiting");
    }

    fn handle_start_scan(&mut self) {
        match self.radio {
            RadioState::Ready => {
                self.registry.reset();
                self.scanning = true;
                self.scan_deadline = Some(Instant::now() + self.config.scan_timeout);
                self.transport.start_discovery(self.config.service_uuid);
                self.log("Scanning for devices...", MessageSeverity::Info);
                self.publish();
            }
            RadioState::PoweredOff => self.permissions.on_radio_powered_off(),
            RadioState::Unauthorized(AuthorizationKind::Denied) => {
                self.permissions.on_radio_unauthorized();
            }
            other => debug!(state = ?other, "Radio not ready, scan ignored"),
        }
    }

    fn handle_stop_scan(&mut self) {
        self.scan_deadline = None;
        if self.scanning {
            self.transport.stop_discovery();
            self.scanning = false;
            self.log("Scan stopped.", MessageSeverity::Info);
            self.publish();
        }
    }

    fn handle_toggle(&mut self, id: DeviceId) {
        let Some(state) = self.registry.state_of(id) else {
            warn!(%id, "Toggle for unknown device ignored");
            return;
        };

        match state {
            ConnectionState::Disconnected => {
                self.timers.arm(id, self.config.connect_timeout);
                self.transport.connect(id);
                self.registry.set_state(id, ConnectionState::Connecting);
                self.log("Connecting to device...", MessageSeverity::Info);
                self.publish();
            }
            // Connecting or connected: tear down. State flips once the
            // transport reports the disconnect.
            _ => {
                self.timers.cancel(id);
                self.transport.cancel_connection(id);
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::RadioState(state) => {
                self.radio = state;
                match state {
                    RadioState::PoweredOff => self.permissions.on_radio_powered_off(),
                    RadioState::Unauthorized(AuthorizationKind::Denied) => {
                        self.permissions.on_radio_unauthorized();
                    }
                    other => debug!(state = ?other, "Radio state changed"),
                }
                self.publish();
            }
            TransportEvent::Discovered { id, name, rssi } => {
                if !self.config.filter.accepts_rssi(rssi) {
                    trace!(%id, rssi, "Discovery below RSSI floor");
                    return;
                }
                if !self.config.filter.matches(&name) {
                    trace!(%id, name, "Discovery rejected by name filter");
                    return;
                }
                self.registry.upsert(id, &name, rssi);
                self.publish();
            }
            TransportEvent::Connected(id) => {
                self.timers.cancel(id);
                self.registry.set_state(id, ConnectionState::Connected);
                self.transport
                    .subscribe_notifications(id, self.config.service_uuid);
                info!(%id, "Device connected");
                self.log("Connection established!", MessageSeverity::Success);
                let _ = self.event_tx.send(BleEvent::DeviceConnected(id));
                self.publish();
            }
            TransportEvent::ConnectFailed { id, reason } => {
                self.timers.cancel(id);
                self.registry.set_state(id, ConnectionState::Disconnected);
                warn!(%id, reason, "Connection failed");
                self.log(
                    format!("Connection failed: {reason}"),
                    MessageSeverity::Warning,
                );
                self.publish();
            }
            TransportEvent::Disconnected { id, reason } => {
                self.timers.cancel(id);
                self.registry.set_state(id, ConnectionState::Disconnected);
                info!(%id, ?reason, "Device disconnected");
                self.log("Disconnected from device", MessageSeverity::Info);
                let _ = self.event_tx.send(BleEvent::DeviceDisconnected(id));
                self.publish();
            }
        }
    }

    fn handle_connect_timeout(&mut self, id: DeviceId) {
        // A cancel may have raced the expiry message; stale expiries are
        // dropped here.
        if !self.timers.acknowledge(id) {
            return;
        }
        if self.registry.state_of(id) == Some(ConnectionState::Connecting) {
            self.registry.set_state(id, ConnectionState::Disconnected);
            self.transport.cancel_connection(id);
            warn!(%id, "Connection attempt timed out");
            self.log("Connection attempt timed out", MessageSeverity::Warning);
            self.publish();
        }
    }

    fn log(&self, message: impl Into<String>, severity: MessageSeverity) {
        let _ = self
            .event_tx
            .send(BleEvent::Log(LogMessage::new(message, severity)));
    }

    fn publish(&self) {
        self.state_tx.send_replace(BleSnapshot {
            scanning: self.scanning,
            radio: self.radio,
            devices: self.registry.all(),
        });
    }
}
