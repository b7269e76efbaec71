//! Device discovery
//!
//! A scan resets the device list and consumes the central's event stream in a
//! background task, appending each newly seen device. Transport errors on
//! individual events are logged and skipped.

use std::sync::Arc;

use futures::stream::StreamExt;
use tracing::{debug, info, warn};

use crate::central::{BleCentral, ScanEventStream, ScanFilter};
use crate::config::ScaleConfig;
use crate::errors::{Result, ScaleError};
use crate::state::SharedState;

// ----------------------------------------------------------------------------
// Device Scanner
// ----------------------------------------------------------------------------

/// Runs scans and feeds discoveries into the store state
pub(crate) struct DeviceScanner<C: BleCentral> {
    central: Arc<C>,
    state: SharedState,
    config: ScaleConfig,
}

impl<C: BleCentral> DeviceScanner<C> {
    pub(crate) fn new(central: Arc<C>, state: SharedState, config: ScaleConfig) -> Self {
        Self {
            central,
            state,
            config,
        }
    }

    fn filter(&self) -> ScanFilter {
        if self.config.filter_by_service {
            ScanFilter::service(self.config.service_uuid)
        } else {
            ScanFilter::unfiltered()
        }
    }

    /// Clear the device list and (re)start discovery.
    ///
    /// Resolves once the central has accepted the scan; discoveries keep
    /// arriving in the background until the scan is stopped.
    pub(crate) async fn scan(&self) -> Result<()> {
        let (generation, restarting) = self.state.update(|state| {
            if state.shut_down {
                return Err(ScaleError::StoreShutDown);
            }
            let restarting = state.scanning;
            Ok((state.begin_scan(), restarting))
        })?;

        if restarting {
            debug!("Restarting scan (generation {})", generation);
            if let Err(e) = self.central.stop_scan().await {
                warn!("Failed to stop previous scan: {}", e);
            }
        }

        let events = match self.central.start_scan(self.filter()).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Failed to start scan: {}", e);
                self.state.update(|state| {
                    if state.scan_generation == generation {
                        state.halt_scan();
                    }
                });
                return Err(e);
            }
        };

        let task = tokio::spawn(consume_scan_events(
            events,
            self.state.clone(),
            self.config.clone(),
            generation,
        ));

        let still_current = self.state.update(|state| {
            if state.scanning && state.scan_generation == generation {
                state.scan_task = Some(task);
                true
            } else {
                task.abort();
                false
            }
        });

        if still_current {
            info!("Started scanning for scales");
        } else {
            // Superseded while the central was starting up.
            debug!("Scan generation {} superseded before it started", generation);
            if let Err(e) = self.central.stop_scan().await {
                warn!("Failed to stop superseded scan: {}", e);
            }
        }

        Ok(())
    }

    /// Stop the running scan, if any. The device list is kept.
    pub(crate) async fn stop(&self) {
        let was_scanning = self.state.update(|state| state.halt_scan());
        if was_scanning {
            if let Err(e) = self.central.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
            info!("Stopped scanning");
        }
    }
}

async fn consume_scan_events(
    mut events: ScanEventStream,
    state: SharedState,
    config: ScaleConfig,
    generation: u64,
) {
    while let Some(event) = events.next().await {
        let device = match event {
            Ok(device) => device,
            Err(e) => {
                warn!("Scan error: {}", e);
                continue;
            }
        };

        if !config.accepts_name(device.name.as_deref()) {
            continue;
        }

        debug!("Discovered {}", device);
        if !state.update(|state| state.record_discovery(generation, device)) {
            break;
        }
    }

    state.update(|state| {
        if state.scanning && state.scan_generation == generation {
            debug!("Scan event stream ended");
            state.scanning = false;
            state.scan_task = None;
        }
    });
}
