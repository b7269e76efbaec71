//! BLE central abstraction
//!
//! The weight store talks to the radio only through [`BleCentral`]. The
//! platform implementation owns the peripheral handles and looks them up by
//! [`DeviceId`]; scans and notifications come back as streams so the store
//! can consume them in background tasks and drop them to unsubscribe.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::codec::Payload;
use crate::errors::Result;
use crate::types::{DeviceId, PeripheralDevice};

// ----------------------------------------------------------------------------
// Streams
// ----------------------------------------------------------------------------

/// Discovery events of a running scan; an `Err` item reports a failed
/// advertisement callback and does not end the scan
pub type ScanEventStream = BoxStream<'static, Result<PeripheralDevice>>;

/// Characteristic notifications of a monitored connection; an `Err` item
/// reports a failed notification and does not end the subscription
pub type NotificationStream = BoxStream<'static, Result<Payload>>;

/// Which advertisements a scan reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    /// Only report peripherals advertising one of these services.
    /// Empty means unfiltered.
    pub services: Vec<Uuid>,
}

impl ScanFilter {
    /// Report every advertisement
    pub fn unfiltered() -> Self {
        Self::default()
    }

    /// Report peripherals advertising `service`
    pub fn service(service: Uuid) -> Self {
        Self {
            services: vec![service],
        }
    }
}

// ----------------------------------------------------------------------------
// Central Trait
// ----------------------------------------------------------------------------

/// Scan, connect and monitor operations of a BLE central
#[async_trait]
pub trait BleCentral: Send + Sync + 'static {
    /// Start a continuous scan. Starting again while scanning restarts it and
    /// ends the previous stream.
    async fn start_scan(&self, filter: ScanFilter) -> Result<ScanEventStream>;

    /// Stop the current scan
    async fn stop_scan(&self) -> Result<()>;

    /// Connect to a discovered device
    async fn connect(&self, device: &DeviceId) -> Result<()>;

    /// Discover all services and characteristics of a connected device
    async fn discover_services(&self, device: &DeviceId) -> Result<()>;

    /// Subscribe to notifications of a characteristic. Dropping the stream
    /// ends the subscription.
    async fn monitor(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream>;

    /// Cancel the connection to a device
    async fn cancel_connection(&self, device: &DeviceId) -> Result<()>;
}
