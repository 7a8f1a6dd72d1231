//! Per-device connection timeout tracking.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::models::DeviceId;

/// At most one armed countdown per device id.
///
/// Expiry is delivered through the receiver returned by [`new`](Self::new),
/// so it always lands on the session task rather than firing concurrently
/// with other session mutations. Arming replaces any existing timer for the
/// same id; cancelling an already-fired timer is a no-op.
pub struct ConnectionTimers {
    expired_tx: mpsc::UnboundedSender<DeviceId>,
    armed: HashMap<DeviceId, JoinHandle<()>>,
}

impl ConnectionTimers {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeviceId>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        (
            Self {
                expired_tx,
                armed: HashMap::new(),
            },
            expired_rx,
        )
    }

    pub fn arm(&mut self, id: DeviceId, duration: Duration) {
        let tx = self.expired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(id);
        });
        if let Some(prior) = self.armed.insert(id, handle) {
            prior.abort();
        }
    }

    pub fn cancel(&mut self, id: DeviceId) {
        if let Some(handle) = self.armed.remove(&id) {
            handle.abort();
        }
    }

    /// Consumes an expiry notification. Returns false when the timer was
    /// cancelled after its message was already queued; such stale expiries
    /// must be ignored by the caller.
    pub fn acknowledge(&mut self, id: DeviceId) -> bool {
        self.armed.remove(&id).is_some()
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.armed.contains_key(&id)
    }

    pub fn clear(&mut self) {
        for (_, handle) in self.armed.drain() {
            handle.abort();
        }
    }
}

impl Drop for ConnectionTimers {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id(n: u128) -> DeviceId {
        Uuid::from_u128(n)
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_fires_once() {
        let (mut timers, mut rx) = ConnectionTimers::new();
        timers.arm(id(1), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(rx.recv().await, Some(id(1)));
        assert!(rx.try_recv().is_err());
        assert!(timers.acknowledge(id(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_expiry() {
        let (mut timers, mut rx) = ConnectionTimers::new();
        timers.arm(id(1), Duration::from_secs(10));
        timers.cancel(id(1));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(rx.try_recv().is_err());
        assert!(!timers.contains(id(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_countdown() {
        let (mut timers, mut rx) = ConnectionTimers::new();
        timers.arm(id(1), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(5)).await;
        timers.arm(id(1), Duration::from_secs(10));

        // Original deadline passes without firing
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(rx.recv().await, Some(id(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn independent_timers_per_device() {
        let (mut timers, mut rx) = ConnectionTimers::new();
        timers.arm(id(1), Duration::from_secs(5));
        timers.arm(id(2), Duration::from_secs(10));
        timers.cancel(id(1));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(rx.recv().await, Some(id(2)));
        assert!(rx.try_recv().is_err());
    }
}
