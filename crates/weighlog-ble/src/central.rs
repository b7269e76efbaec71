//! btleplug implementation of the weight store's BLE central

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter as BtleScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::future;
use futures::stream::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;
use weighlog_core::{
    BleCentral, DeviceId, NotificationStream, Payload, PeripheralDevice, Result, ScanEventStream,
    ScanFilter,
};

use crate::config::BleCentralConfig;
use crate::error::BleCentralError;
use crate::peripheral::{advertised_device, device_id, matches_services, PeripheralRegistry};

// ----------------------------------------------------------------------------
// Central Implementation
// ----------------------------------------------------------------------------

/// [`BleCentral`] backed by the OS adapter through btleplug
pub struct BtleplugCentral {
    adapter: Adapter,
    config: BleCentralConfig,
    registry: Arc<RwLock<PeripheralRegistry>>,
}

impl BtleplugCentral {
    /// Open the configured adapter
    pub async fn new(config: BleCentralConfig) -> std::result::Result<Self, BleCentralError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleCentralError::Manager(e.to_string()))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| BleCentralError::Manager(format!("Failed to get BLE adapters: {}", e)))?;

        let adapter = adapters
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleCentralError::AdapterNotAvailable)?;

        match adapter.adapter_info().await {
            Ok(info) => info!("Using BLE adapter {}", info),
            Err(e) => debug!("Adapter info unavailable: {}", e),
        }

        Ok(Self {
            adapter,
            config,
            registry: Arc::new(RwLock::new(PeripheralRegistry::new())),
        })
    }

    pub fn config(&self) -> &BleCentralConfig {
        &self.config
    }

    /// Find the peripheral for `device`, asking the adapter when no scan of
    /// this central has reported it
    async fn peripheral(
        &self,
        device: &DeviceId,
    ) -> std::result::Result<Peripheral, BleCentralError> {
        if let Some(peripheral) = self.registry.read().await.get(device) {
            return Ok(peripheral);
        }

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| BleCentralError::DeviceNotFound {
                device_id: format!("{} ({})", device, e),
            })?;

        let peripheral = peripherals
            .into_iter()
            .find(|p| device_id(p) == *device)
            .ok_or_else(|| BleCentralError::DeviceNotFound {
                device_id: device.to_string(),
            })?;

        self.registry
            .write()
            .await
            .insert(device.clone(), peripheral.clone());
        Ok(peripheral)
    }
}

/// Resolve a discovery event to a store device, or `None` for events a scan
/// does not report
async fn discovered_device(
    adapter: &Adapter,
    registry: &RwLock<PeripheralRegistry>,
    services: &[Uuid],
    report_updates: bool,
    event: CentralEvent,
) -> Option<Result<PeripheralDevice>> {
    let id: PeripheralId = match event {
        CentralEvent::DeviceDiscovered(id) => id,
        CentralEvent::DeviceUpdated(id) if report_updates => id,
        _ => return None,
    };

    let peripheral = match adapter.peripheral(&id).await {
        Ok(peripheral) => peripheral,
        Err(e) => return Some(Err(BleCentralError::ScanFailed(e.to_string()).into())),
    };

    let properties = match peripheral.properties().await {
        Ok(Some(properties)) => properties,
        Ok(None) => return None,
        Err(e) => return Some(Err(BleCentralError::ScanFailed(e.to_string()).into())),
    };

    if !matches_services(services, &properties.services) {
        return None;
    }

    let id = device_id(&peripheral);
    registry.write().await.insert(id.clone(), peripheral);
    Some(Ok(advertised_device(id, properties.local_name, properties.rssi)))
}

#[async_trait]
impl BleCentral for BtleplugCentral {
    async fn start_scan(&self, filter: ScanFilter) -> Result<ScanEventStream> {
        let events = self
            .adapter
            .events()
            .await
            .map_err(|e| BleCentralError::EventStreamFailed(e.to_string()))?;

        self.adapter
            .start_scan(BtleScanFilter {
                services: filter.services.clone(),
            })
            .await
            .map_err(|e| BleCentralError::ScanFailed(e.to_string()))?;

        info!("Started BLE scan");

        let adapter = self.adapter.clone();
        let registry = Arc::clone(&self.registry);
        let services = Arc::new(filter.services);
        let report_updates = self.config.report_updates;

        let devices = events.filter_map(move |event| {
            let adapter = adapter.clone();
            let registry = Arc::clone(&registry);
            let services = Arc::clone(&services);
            async move {
                discovered_device(&adapter, &registry, &services, report_updates, event).await
            }
        });

        Ok(devices.boxed())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| BleCentralError::ScanFailed(format!("Failed to stop BLE scan: {}", e)))?;
        debug!("Stopped BLE scan");
        Ok(())
    }

    async fn connect(&self, device: &DeviceId) -> Result<()> {
        let peripheral = self.peripheral(device).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| BleCentralError::ConnectionFailed {
                device_id: device.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Connected to peripheral {}", device);
        Ok(())
    }

    async fn discover_services(&self, device: &DeviceId) -> Result<()> {
        let peripheral = self.peripheral(device).await?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| BleCentralError::ServiceDiscoveryFailed(e.to_string()))?;
        debug!(
            "Discovered {} characteristics on {}",
            peripheral.characteristics().len(),
            device
        );
        Ok(())
    }

    async fn monitor(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream> {
        let peripheral = self.peripheral(device).await?;

        let target = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or_else(|| BleCentralError::CharacteristicNotFound {
                characteristic: characteristic.to_string(),
            })?;

        // Take the stream before subscribing so the first value is not missed.
        let notifications = peripheral
            .notifications()
            .await
            .map_err(|e| BleCentralError::NotificationStreamFailed(e.to_string()))?;

        peripheral
            .subscribe(&target)
            .await
            .map_err(|e| BleCentralError::SubscriptionFailed(e.to_string()))?;

        debug!("Subscribed to {} on {}", characteristic, device);

        // btleplug keeps the notification stream open after a link loss, so
        // end it when the adapter reports the disconnect.
        let peripheral_id = peripheral.id();
        let disconnected = self
            .adapter
            .events()
            .await
            .map_err(|e| BleCentralError::EventStreamFailed(e.to_string()))?
            .filter(move |event| {
                future::ready(matches!(
                    event,
                    CentralEvent::DeviceDisconnected(id) if *id == peripheral_id
                ))
            })
            .into_future();

        let payloads = notifications
            .filter_map(move |notification| {
                let payload = (notification.uuid == characteristic)
                    .then(|| Ok(Payload::Bytes(notification.value)));
                future::ready(payload)
            })
            .take_until(disconnected);

        Ok(payloads.boxed())
    }

    async fn cancel_connection(&self, device: &DeviceId) -> Result<()> {
        let peripheral = self.peripheral(device).await?;

        match peripheral.is_connected().await {
            Ok(false) => {
                debug!("Peripheral {} already disconnected", device);
                return Ok(());
            }
            Ok(true) => {}
            Err(e) => warn!("Could not query connection state of {}: {}", device, e),
        }

        peripheral
            .disconnect()
            .await
            .map_err(|e| BleCentralError::DisconnectFailed {
                device_id: device.to_string(),
                reason: e.to_string(),
            })?;
        info!("Disconnected from peripheral {}", device);
        Ok(())
    }
}
