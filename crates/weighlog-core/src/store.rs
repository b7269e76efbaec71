//! Weight state store
//!
//! [`WeightStore`] is the one object consumers hold. It owns the device list,
//! the active connection and the latest weight, and exposes them read-only
//! next to the four control operations. Clones share the same store; the
//! resources are released by [`WeightStore::shutdown`] or, failing that, when
//! the last clone is dropped.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::central::BleCentral;
use crate::config::ScaleConfig;
use crate::connection::ConnectionManager;
use crate::errors::{Result, ScaleError};
use crate::permissions::{
    AlwaysGranted, PermissionBackend, PermissionNegotiator, PermissionStrategy, Platform,
    Rationale,
};
use crate::scanner::DeviceScanner;
use crate::state::SharedState;
use crate::types::{Grams, PeripheralDevice, StoreSnapshot};

// ----------------------------------------------------------------------------
// Weight Store
// ----------------------------------------------------------------------------

/// Shared scale state plus scan / connect / disconnect / permission controls
pub struct WeightStore<C: BleCentral> {
    inner: Arc<StoreInner<C>>,
}

impl<C: BleCentral> Clone for WeightStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StoreInner<C: BleCentral> {
    central: Arc<C>,
    state: SharedState,
    config: ScaleConfig,
    negotiator: PermissionNegotiator,
    scanner: DeviceScanner<C>,
    connections: ConnectionManager<C>,
}

impl<C: BleCentral> WeightStore<C> {
    /// Start building a store around a central
    pub fn builder(central: Arc<C>) -> WeightStoreBuilder<C> {
        WeightStoreBuilder::new(central)
    }

    /// Create a store with default configuration on a desktop host
    pub fn new(central: Arc<C>) -> Result<Self> {
        Self::builder(central).build()
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    /// Devices discovered by the current or last scan, in discovery order
    pub fn devices(&self) -> Vec<PeripheralDevice> {
        self.inner.state.read(|state| state.devices.clone())
    }

    /// Device of the active connection
    pub fn connected_device(&self) -> Option<PeripheralDevice> {
        self.inner
            .state
            .read(|state| state.connection.as_ref().map(|c| c.device.clone()))
    }

    /// Latest weight reported by the connected scale
    pub fn weight(&self) -> Option<Grams> {
        self.inner.state.read(|state| state.weight)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.read(|state| state.connection.is_some())
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.state.read(|state| state.scanning)
    }

    /// Current state in one consistent read
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.state.read(|state| state.snapshot())
    }

    /// Receive a snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.inner.config
    }

    /// Permission flow selected for the platform
    pub fn permission_strategy(&self) -> PermissionStrategy {
        self.inner.negotiator.strategy()
    }

    // ------------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------------

    /// Ask for the OS permissions scanning needs. `false` means the caller
    /// must not scan.
    pub async fn request_permissions(&self) -> bool {
        self.inner.negotiator.request_permissions().await
    }

    /// Clear the device list and start discovering scales
    pub async fn scan_devices(&self) -> Result<()> {
        self.inner.scanner.scan().await
    }

    /// Stop discovering without connecting
    pub async fn stop_scan(&self) {
        self.inner.scanner.stop().await
    }

    /// Connect to a discovered scale, replacing any current connection.
    ///
    /// On success scanning has stopped and weight updates are flowing.
    pub async fn connect_device(&self, device: &PeripheralDevice) -> Result<()> {
        self.inner
            .connections
            .connect(device, &self.inner.scanner)
            .await
    }

    /// Drop the active connection and forget its weight.
    ///
    /// The state is cleared before the transport teardown is awaited, so
    /// readers see the disconnect immediately.
    pub async fn disconnect_device(&self) {
        self.inner.connections.disconnect().await
    }

    /// Stop scanning and cancel the connection. Later calls do nothing, as do
    /// scan and connect requests.
    pub async fn shutdown(&self) {
        let first = self.inner.state.update(|state| {
            let first = !state.shut_down;
            state.shut_down = true;
            first
        });
        if !first {
            return;
        }

        info!("Shutting down weight store");
        self.inner.scanner.stop().await;
        self.inner.connections.disconnect().await;
    }
}

impl<C: BleCentral> Drop for StoreInner<C> {
    fn drop(&mut self) {
        let (was_scanning, connection) = self.state.update(|state| {
            if state.shut_down {
                return (false, None);
            }
            state.shut_down = true;
            (state.halt_scan(), state.release_connection())
        });

        if !was_scanning && connection.is_none() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Weight store dropped outside a runtime; BLE teardown skipped");
            return;
        };

        debug!("Weight store dropped without shutdown, releasing BLE resources");
        let central = Arc::clone(&self.central);
        runtime.spawn(async move {
            if was_scanning {
                if let Err(e) = central.stop_scan().await {
                    warn!("Failed to stop scan: {}", e);
                }
            }
            if let Some(connection) = connection {
                if let Err(e) = central.cancel_connection(&connection.device.id).await {
                    warn!("Failed to cancel connection to {}: {}", connection.device, e);
                }
            }
        });
    }
}

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Configures a [`WeightStore`]
pub struct WeightStoreBuilder<C: BleCentral> {
    central: Arc<C>,
    config: ScaleConfig,
    platform: Platform,
    permissions: Option<Arc<dyn PermissionBackend>>,
    rationale: Rationale,
}

impl<C: BleCentral> WeightStoreBuilder<C> {
    fn new(central: Arc<C>) -> Self {
        Self {
            central,
            config: ScaleConfig::default(),
            platform: Platform::default(),
            permissions: None,
            rationale: Rationale::default(),
        }
    }

    pub fn with_config(mut self, config: ScaleConfig) -> Self {
        self.config = config;
        self
    }

    /// Platform used to select the permission flow
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_permission_backend(mut self, backend: Arc<dyn PermissionBackend>) -> Self {
        self.permissions = Some(backend);
        self
    }

    /// Text shown with the location permission dialog
    pub fn with_rationale(mut self, rationale: Rationale) -> Self {
        self.rationale = rationale;
        self
    }

    pub fn build(self) -> Result<WeightStore<C>> {
        self.config.validate()?;

        let strategy = PermissionStrategy::for_platform(self.platform);
        let backend = match (self.permissions, strategy) {
            (Some(backend), _) => backend,
            (None, PermissionStrategy::NotRequired) => Arc::new(AlwaysGranted),
            (None, _) => {
                return Err(ScaleError::Config(format!(
                    "platform {:?} needs a permission backend",
                    self.platform
                )))
            }
        };

        let state = SharedState::new();
        let negotiator = PermissionNegotiator::new(self.platform, backend, self.rationale);
        let scanner = DeviceScanner::new(self.central.clone(), state.clone(), self.config.clone());
        let connections =
            ConnectionManager::new(self.central.clone(), state.clone(), self.config.clone());

        Ok(WeightStore {
            inner: Arc::new(StoreInner {
                central: self.central,
                state,
                config: self.config,
                negotiator,
                scanner,
                connections,
            }),
        })
    }
}
