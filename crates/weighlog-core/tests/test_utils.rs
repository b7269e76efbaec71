//! Test utilities for driving the weight store without a radio
//!
//! `MockCentral` implements `BleCentral` with channels the test pushes
//! advertisements and notifications into, and records every transport call so
//! tests can assert how often scans were stopped or connections cancelled.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::StreamExt;
use tokio::sync::Notify;
use uuid::Uuid;

use weighlog_core::{
    BleCentral, DeviceId, NotificationStream, Payload, PeripheralDevice, Result, ScaleError,
    ScanEventStream, ScanFilter,
};

// ----------------------------------------------------------------------------
// Mock Central
// ----------------------------------------------------------------------------

#[derive(Default)]
struct MockState {
    scan_tx: Option<UnboundedSender<Result<PeripheralDevice>>>,
    scan_starts: usize,
    scan_stops: usize,
    last_filter: Option<ScanFilter>,
    fail_scan: bool,
    connects: Vec<DeviceId>,
    discoveries: Vec<DeviceId>,
    cancels: Vec<DeviceId>,
    monitored: Vec<(DeviceId, Uuid, Uuid)>,
    failing_connects: HashSet<DeviceId>,
    failing_discovery: HashSet<DeviceId>,
    failing_monitors: HashSet<DeviceId>,
    hang_connects: bool,
    connect_gate: Option<Arc<Notify>>,
    notifiers: HashMap<DeviceId, UnboundedSender<Result<Payload>>>,
}

/// Scriptable in-memory BLE central
#[derive(Default)]
pub struct MockCentral {
    state: Mutex<MockState>,
}

impl MockCentral {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    pub fn fail_scan_start(&self) {
        self.with_state(|s| s.fail_scan = true);
    }

    pub fn fail_connect(&self, id: &str) {
        self.with_state(|s| s.failing_connects.insert(DeviceId::from(id)));
    }

    pub fn fail_discovery(&self, id: &str) {
        self.with_state(|s| s.failing_discovery.insert(DeviceId::from(id)));
    }

    pub fn fail_monitor(&self, id: &str) {
        self.with_state(|s| s.failing_monitors.insert(DeviceId::from(id)));
    }

    /// Make every connect attempt wait until the returned gate is notified
    pub fn gate_connects(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.with_state(|s| s.connect_gate = Some(gate.clone()));
        gate
    }

    /// Make every connect attempt never complete
    pub fn hang_connects(&self) {
        self.with_state(|s| s.hang_connects = true);
    }

    /// Deliver an advertisement to the running scan. Returns `false` when no
    /// scan is listening.
    pub fn advertise(&self, id: &str, name: Option<&str>) -> bool {
        let device = PeripheralDevice::new(id, name.map(str::to_string));
        self.with_state(|s| match &s.scan_tx {
            Some(tx) => tx.unbounded_send(Ok(device)).is_ok(),
            None => false,
        })
    }

    /// Deliver a failed advertisement callback to the running scan
    pub fn scan_error(&self, reason: &str) -> bool {
        self.with_state(|s| match &s.scan_tx {
            Some(tx) => tx
                .unbounded_send(Err(ScaleError::Scan(reason.to_string())))
                .is_ok(),
            None => false,
        })
    }

    /// Push a raw notification to a monitored device
    pub fn notify(&self, id: &str, notification: Result<Payload>) -> bool {
        self.with_state(|s| match s.notifiers.get(&DeviceId::from(id)) {
            Some(tx) => tx.unbounded_send(notification).is_ok(),
            None => false,
        })
    }

    /// End the notification stream of `id`, as a dropped link does
    pub fn drop_link(&self, id: &str) -> bool {
        self.with_state(|s| s.notifiers.remove(&DeviceId::from(id)).is_some())
    }

    /// Push `text` the way base64 bindings deliver characteristic values
    pub fn notify_text(&self, id: &str, text: &str) -> bool {
        self.notify(id, Ok(Payload::Base64(STANDARD.encode(text))))
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn scan_starts(&self) -> usize {
        self.with_state(|s| s.scan_starts)
    }

    pub fn scan_stops(&self) -> usize {
        self.with_state(|s| s.scan_stops)
    }

    pub fn last_filter(&self) -> Option<ScanFilter> {
        self.with_state(|s| s.last_filter.clone())
    }

    pub fn connects(&self) -> Vec<DeviceId> {
        self.with_state(|s| s.connects.clone())
    }

    pub fn discoveries(&self) -> Vec<DeviceId> {
        self.with_state(|s| s.discoveries.clone())
    }

    pub fn cancels(&self) -> Vec<DeviceId> {
        self.with_state(|s| s.cancels.clone())
    }

    pub fn monitored(&self) -> Vec<(DeviceId, Uuid, Uuid)> {
        self.with_state(|s| s.monitored.clone())
    }

    /// Whether the store still holds the notification stream of `id`
    pub fn subscription_open(&self, id: &str) -> bool {
        self.with_state(|s| {
            s.notifiers
                .get(&DeviceId::from(id))
                .map(|tx| !tx.is_closed())
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl BleCentral for MockCentral {
    async fn start_scan(&self, filter: ScanFilter) -> Result<ScanEventStream> {
        self.with_state(|s| {
            if s.fail_scan {
                return Err(ScaleError::AdapterNotAvailable);
            }
            let (tx, rx) = unbounded();
            s.scan_tx = Some(tx);
            s.scan_starts += 1;
            s.last_filter = Some(filter);
            Ok(rx.boxed())
        })
    }

    async fn stop_scan(&self) -> Result<()> {
        self.with_state(|s| {
            s.scan_tx = None;
            s.scan_stops += 1;
        });
        Ok(())
    }

    async fn connect(&self, device: &DeviceId) -> Result<()> {
        let (gate, hang) = self.with_state(|s| {
            s.connects.push(device.clone());
            if s.failing_connects.contains(device) {
                return Err(ScaleError::connection_failed(device, "device unreachable"));
            }
            Ok((s.connect_gate.clone(), s.hang_connects))
        })?;

        if let Some(gate) = gate {
            gate.notified().await;
        }
        if hang {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn discover_services(&self, device: &DeviceId) -> Result<()> {
        self.with_state(|s| {
            s.discoveries.push(device.clone());
            if s.failing_discovery.contains(device) {
                return Err(ScaleError::ServiceDiscoveryFailed(
                    "GATT error 133".to_string(),
                ));
            }
            Ok(())
        })
    }

    async fn monitor(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream> {
        self.with_state(|s| {
            if s.failing_monitors.contains(device) {
                return Err(ScaleError::SubscriptionFailed(
                    "notify not permitted".to_string(),
                ));
            }
            let (tx, rx) = unbounded();
            s.notifiers.insert(device.clone(), tx);
            s.monitored.push((device.clone(), service, characteristic));
            Ok(rx.boxed())
        })
    }

    async fn cancel_connection(&self, device: &DeviceId) -> Result<()> {
        self.with_state(|s| s.cancels.push(device.clone()));
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Wait for background tasks until `condition` holds; `false` on timeout
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}

/// Give background tasks a chance to run before asserting that nothing
/// happened
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub fn device_ids(devices: &[PeripheralDevice]) -> Vec<&str> {
    devices.iter().map(|d| d.id.as_str()).collect()
}
