//! Bounded registry of discovered devices.

use std::collections::HashMap;
use std::time::Instant;

use crate::domain::models::{ConnectionState, Device, DeviceId};

struct Entry {
    device: Device,
    /// Monotonic insertion sequence; breaks eviction ties deterministically.
    seq: u64,
}

/// De-duplicated collection of discovered devices, capacity-bounded.
///
/// When an insert would exceed capacity the entry with the weakest signal is
/// evicted (ties: earliest-inserted goes first). Entries leave only through
/// eviction or [`reset`](Self::reset) -- never because a device disconnected.
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, Entry>,
    capacity: usize,
    next_seq: u64,
}

impl DeviceRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            devices: HashMap::new(),
            capacity,
            next_seq: 0,
        }
    }

    /// Clears all entries; called at the start of every scan cycle.
    pub fn reset(&mut self) {
        self.devices.clear();
    }

    /// Inserts a first sighting or refreshes the signal strength of a known
    /// device. Name and state are never touched on re-sighting.
    pub fn upsert(&mut self, id: DeviceId, name: &str, rssi: i16) {
        if let Some(entry) = self.devices.get_mut(&id) {
            entry.device.rssi = rssi;
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.devices.insert(
            id,
            Entry {
                device: Device::new(id, name, rssi),
                seq,
            },
        );

        if self.devices.len() > self.capacity {
            self.evict_weakest();
        }
    }

    fn evict_weakest(&mut self) {
        let weakest = self
            .devices
            .values()
            .min_by_key(|e| (e.device.rssi, e.seq))
            .map(|e| e.device.id);
        if let Some(id) = weakest {
            self.devices.remove(&id);
        }
    }

    /// Transitions a device's state. No-op for unknown ids.
    ///
    /// Entering `Connecting` stamps the attempt time; falling back from
    /// `Connecting` to `Disconnected` clears it.
    pub fn set_state(&mut self, id: DeviceId, state: ConnectionState) {
        let Some(entry) = self.devices.get_mut(&id) else {
            return;
        };
        let prior = entry.device.state;
        entry.device.state = state;
        match state {
            ConnectionState::Connecting => {
                entry.device.last_connection_attempt = Some(Instant::now());
            }
            ConnectionState::Disconnected if prior == ConnectionState::Connecting => {
                entry.device.last_connection_attempt = None;
            }
            _ => {}
        }
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id).map(|e| &e.device)
    }

    pub fn state_of(&self, id: DeviceId) -> Option<ConnectionState> {
        self.get(id).map(|d| d.state)
    }

    /// Snapshot of all entries, strongest signal first (display order).
    pub fn all(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.values().map(|e| e.device.clone()).collect();
        devices.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
