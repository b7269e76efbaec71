//! Connection management
//!
//! The store holds at most one connection. Connecting replaces any previous
//! connection, stops a running scan and installs the weight monitor before
//! returning. Disconnecting clears the connection and the weight before the
//! transport teardown is awaited.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::central::BleCentral;
use crate::config::ScaleConfig;
use crate::errors::{Result, ScaleError};
use crate::monitor::CharacteristicMonitor;
use crate::scanner::DeviceScanner;
use crate::state::{ActiveConnection, SharedState};
use crate::types::{DeviceId, PeripheralDevice};

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

/// Establishes and tears down the store's single connection
pub(crate) struct ConnectionManager<C: BleCentral> {
    central: Arc<C>,
    monitor: CharacteristicMonitor<C>,
    state: SharedState,
    config: ScaleConfig,
}

impl<C: BleCentral> ConnectionManager<C> {
    pub(crate) fn new(central: Arc<C>, state: SharedState, config: ScaleConfig) -> Self {
        Self {
            monitor: CharacteristicMonitor::new(Arc::clone(&central)),
            central,
            state,
            config,
        }
    }

    /// Connect to `device` and start monitoring its weight characteristic
    pub(crate) async fn connect(
        &self,
        device: &PeripheralDevice,
        scanner: &DeviceScanner<C>,
    ) -> Result<()> {
        let (epoch, previous) = self.state.update(|state| {
            if state.shut_down {
                return Err(ScaleError::StoreShutDown);
            }
            Ok(state.begin_connect(&device.id))
        })?;

        if let Some(previous) = previous {
            info!("Replacing connection to {}", previous.device);
            self.cancel(&previous.device.id).await;
        }

        let result = self.attempt(device, epoch, scanner).await;
        if result.is_err() {
            self.state.update(|state| state.settle_connect(epoch));
        }
        result
    }

    async fn attempt(
        &self,
        device: &PeripheralDevice,
        epoch: u64,
        scanner: &DeviceScanner<C>,
    ) -> Result<()> {
        info!("Connecting to {}", device);
        if let Err(e) = self.establish(&device.id, epoch).await {
            error!("Failed to connect to {}: {}", device, e);
            return Err(e);
        }

        scanner.stop().await;

        let notifications = match self
            .monitor
            .subscribe(
                &device.id,
                self.config.service_uuid,
                self.config.characteristic_uuid,
            )
            .await
        {
            Ok(notifications) => notifications,
            Err(e) => {
                error!("Failed to monitor weight on {}: {}", device, e);
                self.release(&device.id, epoch).await;
                return Err(e);
            }
        };

        let installed = self.state.update(|state| {
            if !state.connect_still_wanted(epoch) {
                return None;
            }
            let listed = state
                .devices
                .iter()
                .find(|known| known.id == device.id)
                .cloned()
                .unwrap_or_else(|| device.clone());

            let monitor_state = self.state.clone();
            let link_state = self.state.clone();
            let lost_device = listed.clone();
            let monitor = CharacteristicMonitor::<C>::spawn(
                device.id.clone(),
                notifications,
                move |grams| monitor_state.update(|state| state.apply_weight(epoch, grams)),
                move || {
                    let lost = link_state.update(|state| state.release_lost_connection(epoch));
                    if lost {
                        warn!("Lost connection to {}", lost_device);
                    }
                },
            );
            state.settle_connect(epoch);
            state.connection = Some(ActiveConnection {
                device: listed.clone(),
                epoch,
                monitor,
            });
            Some(listed)
        });

        match installed {
            Some(connected) => {
                info!("Connected to {}", connected);
                Ok(())
            }
            None => self.abort(&device.id, epoch).await,
        }
    }

    /// Connect and discover services, honouring the timeout and aborts
    async fn establish(&self, device: &DeviceId, epoch: u64) -> Result<()> {
        let connect = self.central.connect(device);
        let connected = match self.config.connection_timeout() {
            Some(limit) => match timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => {
                    // The platform may still complete the attempt later.
                    self.release(device, epoch).await;
                    return Err(ScaleError::ConnectionTimeout {
                        device_id: device.to_string(),
                        duration_ms: limit.as_millis() as u64,
                    });
                }
            },
            None => connect.await,
        };
        connected?;

        if !self.state.read(|state| state.connect_still_wanted(epoch)) {
            return self.abort(device, epoch).await;
        }

        if let Err(e) = self.central.discover_services(device).await {
            self.release(device, epoch).await;
            return Err(e);
        }

        if !self.state.read(|state| state.connect_still_wanted(epoch)) {
            return self.abort(device, epoch).await;
        }

        debug!("Discovered services on {}", device);
        Ok(())
    }

    async fn abort(&self, device: &DeviceId, epoch: u64) -> Result<()> {
        info!("Connect to {} aborted", device);
        self.release(device, epoch).await;
        Err(ScaleError::ConnectionAborted {
            device_id: device.to_string(),
        })
    }

    /// Tear down the link opened by the attempt at `epoch`, unless a newer
    /// connect to the same device now relies on it
    async fn release(&self, device: &DeviceId, epoch: u64) {
        if self.state.read(|state| state.device_claimed(device, epoch)) {
            debug!("Keeping link to {} for the newer connect", device);
            return;
        }
        self.cancel(device).await;
    }

    /// Drop the active connection. No-op when nothing is connected.
    pub(crate) async fn disconnect(&self) {
        let released = self.state.update(|state| state.release_connection());
        if let Some(connection) = released {
            self.cancel(&connection.device.id).await;
            info!("Disconnected from {}", connection.device);
        }
    }

    async fn cancel(&self, device: &DeviceId) {
        if let Err(e) = self.central.cancel_connection(device).await {
            warn!("Failed to cancel connection to {}: {}", device, e);
        }
    }
}
