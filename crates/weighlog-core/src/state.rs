//! Shared store state
//!
//! One mutex guards the device list, the active connection and the latest
//! weight. Every mutation goes through [`SharedState::update`], which publishes
//! a fresh [`StoreSnapshot`] before the lock is released, so subscribers never
//! observe a value older than what an accessor would return.
//!
//! Two counters keep background tasks honest: `scan_generation` changes when a
//! scan is restarted or stopped, `connection_epoch` when a connection is
//! replaced, released or an in-flight connect is aborted. Tasks carry the
//! value they were started with and their events are dropped once it no
//! longer matches.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::types::{DeviceId, Grams, PeripheralDevice, StoreSnapshot};

// ----------------------------------------------------------------------------
// Active Connection
// ----------------------------------------------------------------------------

/// The single connection owned by the store
#[derive(Debug)]
pub(crate) struct ActiveConnection {
    pub(crate) device: PeripheralDevice,
    pub(crate) epoch: u64,
    pub(crate) monitor: JoinHandle<()>,
}

// ----------------------------------------------------------------------------
// Store State
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) devices: Vec<PeripheralDevice>,
    pub(crate) scanning: bool,
    pub(crate) scan_generation: u64,
    pub(crate) scan_task: Option<JoinHandle<()>>,
    pub(crate) connection: Option<ActiveConnection>,
    pub(crate) connection_epoch: u64,
    /// Target of the connect started at `connection_epoch`, until it settles
    pub(crate) pending_connect: Option<(u64, DeviceId)>,
    pub(crate) weight: Option<Grams>,
    pub(crate) shut_down: bool,
}

impl StoreState {
    pub(crate) fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            devices: self.devices.clone(),
            connected_device: self.connection.as_ref().map(|c| c.device.clone()),
            weight: self.weight,
            scanning: self.scanning,
        }
    }

    /// Reset the device list and open a new scan generation
    pub(crate) fn begin_scan(&mut self) -> u64 {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        self.devices.clear();
        self.scan_generation += 1;
        self.scanning = true;
        self.scan_generation
    }

    /// Stop accepting scan events. Returns whether a scan was running.
    pub(crate) fn halt_scan(&mut self) -> bool {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        let was_scanning = self.scanning;
        self.scanning = false;
        self.scan_generation += 1;
        was_scanning
    }

    /// Append a discovered device unless it is already listed or the scan
    /// that found it is no longer current. Returns `false` for stale scans.
    pub(crate) fn record_discovery(&mut self, generation: u64, device: PeripheralDevice) -> bool {
        if !self.scanning || self.scan_generation != generation {
            return false;
        }
        if !self.devices.iter().any(|known| known.id == device.id) {
            self.devices.push(device);
        }
        true
    }

    /// Take the active connection out of the store, invalidating its monitor
    /// and any connect still in flight. The weight is cleared with it.
    pub(crate) fn release_connection(&mut self) -> Option<ActiveConnection> {
        self.connection_epoch += 1;
        self.pending_connect = None;
        self.weight = None;
        let connection = self.connection.take();
        if let Some(active) = &connection {
            active.monitor.abort();
        }
        connection
    }

    /// Drop the connection opened at `epoch` after its link failed. The
    /// monitor is finishing on its own and is not aborted. Returns `false`
    /// when that connection was already replaced or released.
    pub(crate) fn release_lost_connection(&mut self, epoch: u64) -> bool {
        match &self.connection {
            Some(active) if active.epoch == epoch => {
                self.connection_epoch += 1;
                self.weight = None;
                self.connection = None;
                true
            }
            _ => false,
        }
    }

    /// Open a connect attempt to `device`, releasing the current connection
    pub(crate) fn begin_connect(&mut self, device: &DeviceId) -> (u64, Option<ActiveConnection>) {
        let previous = self.release_connection();
        self.pending_connect = Some((self.connection_epoch, device.clone()));
        (self.connection_epoch, previous)
    }

    /// Forget the attempt started at `epoch` if it is still the pending one
    pub(crate) fn settle_connect(&mut self, epoch: u64) {
        if matches!(&self.pending_connect, Some((pending, _)) if *pending == epoch) {
            self.pending_connect = None;
        }
    }

    /// Whether a connection or connect attempt newer than `epoch` targets
    /// `device`. Its link must then survive the older attempt's teardown.
    pub(crate) fn device_claimed(&self, device: &DeviceId, epoch: u64) -> bool {
        let connected = self
            .connection
            .as_ref()
            .map_or(false, |active| active.epoch != epoch && active.device.id == *device);
        let pending = self
            .pending_connect
            .as_ref()
            .map_or(false, |(pending, id)| *pending != epoch && id == device);
        connected || pending
    }

    /// Whether a connect started at `epoch` may still complete
    pub(crate) fn connect_still_wanted(&self, epoch: u64) -> bool {
        !self.shut_down && self.connection_epoch == epoch
    }

    /// Store a decoded reading if it belongs to the active connection.
    /// Returns `false` when the connection it came from is gone.
    pub(crate) fn apply_weight(&mut self, epoch: u64, grams: Grams) -> bool {
        match &self.connection {
            Some(active) if active.epoch == epoch => {
                self.weight = Some(grams);
                true
            }
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Shared State Handle
// ----------------------------------------------------------------------------

/// Cloneable handle to the store state and its snapshot channel
#[derive(Clone)]
pub(crate) struct SharedState {
    inner: Arc<Mutex<StoreState>>,
    updates: Arc<watch::Sender<StoreSnapshot>>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        let (updates, _) = watch::channel(StoreSnapshot::default());
        Self {
            inner: Arc::new(Mutex::new(StoreState::default())),
            updates: Arc::new(updates),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the state without publishing
    pub(crate) fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate the state and publish the resulting snapshot if it changed
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        let next = state.snapshot();
        self.updates.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        result
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> PeripheralDevice {
        PeripheralDevice::new(id, None)
    }

    #[test]
    fn test_discovery_dedups_in_first_seen_order() {
        let mut state = StoreState::default();
        let generation = state.begin_scan();

        for id in ["A", "B", "A", "C", "B"] {
            assert!(state.record_discovery(generation, device(id)));
        }

        let ids: Vec<_> = state.devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let mut state = StoreState::default();
        let first = state.begin_scan();
        state.record_discovery(first, device("A"));

        let second = state.begin_scan();
        assert!(state.devices.is_empty());
        assert!(!state.record_discovery(first, device("B")));
        assert!(state.record_discovery(second, device("C")));

        state.halt_scan();
        assert!(!state.record_discovery(second, device("D")));
        assert_eq!(state.devices.len(), 1);
    }

    #[tokio::test]
    async fn test_weight_for_released_connection_is_dropped() {
        let mut state = StoreState::default();
        state.connection_epoch = 1;
        state.connection = Some(ActiveConnection {
            device: device("AA:BB"),
            epoch: 1,
            monitor: tokio::spawn(async {}),
        });

        assert!(state.apply_weight(1, Grams::new(245)));
        assert_eq!(state.weight, Some(Grams::new(245)));

        let released = state.release_connection();
        assert!(released.is_some());
        assert_eq!(state.weight, None);
        assert!(!state.apply_weight(1, Grams::new(300)));
        assert_eq!(state.weight, None);
        assert!(!state.connect_still_wanted(1));
    }

    #[tokio::test]
    async fn test_newer_connect_claims_device() {
        let mut state = StoreState::default();
        let (first, _) = state.begin_connect(&DeviceId::from("A"));
        let (second, _) = state.begin_connect(&DeviceId::from("A"));

        assert!(state.device_claimed(&DeviceId::from("A"), first));
        assert!(!state.device_claimed(&DeviceId::from("B"), first));
        assert!(!state.device_claimed(&DeviceId::from("A"), second));

        state.settle_connect(second);
        state.connection = Some(ActiveConnection {
            device: device("A"),
            epoch: second,
            monitor: tokio::spawn(async {}),
        });
        assert!(state.device_claimed(&DeviceId::from("A"), first));

        state.release_connection();
        assert!(!state.device_claimed(&DeviceId::from("A"), first));
    }

    #[test]
    fn test_update_publishes_snapshot() {
        let shared = SharedState::new();
        let mut updates = shared.subscribe();

        shared.update(|state| {
            let generation = state.begin_scan();
            state.record_discovery(generation, device("AA:BB"));
        });

        assert!(updates.has_changed().unwrap());
        let snapshot = updates.borrow_and_update().clone();
        assert!(snapshot.scanning);
        assert_eq!(snapshot.devices, vec![device("AA:BB")]);

        shared.update(|_| ());
        assert!(!updates.has_changed().unwrap());
    }
}
