//! Command handlers for the weighlog CLI

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{info, warn};
use weighlog_ble::BtleplugCentral;
use weighlog_core::{BleCentral, DeviceId, Grams, PeripheralDevice, StoreSnapshot, WeightStore};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::entry::FoodLogEntry;
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        if let Commands::Config { write } = cli.command {
            return Self::handle_config_command(&config, write);
        }

        let central = BtleplugCentral::new(config.ble.clone()).await?;
        let store = WeightStore::builder(Arc::new(central))
            .with_config(config.scale.clone())
            .with_platform(config.platform)
            .build()?;

        if !store.request_permissions().await {
            return Err(CliError::PermissionDenied);
        }

        let discovery = Duration::from_secs(config.discovery_timeout_secs);
        let result = match cli.command {
            Commands::Scan { duration } => {
                Self::handle_scan_command(&store, Duration::from_secs(duration)).await
            }
            Commands::Weigh { device_id, samples } => {
                Self::handle_weigh_command(&store, device_id.into(), discovery, samples).await
            }
            Commands::Log {
                device_id,
                food,
                settle,
            } => {
                Self::handle_log_command(
                    &store,
                    device_id.into(),
                    discovery,
                    food,
                    Duration::from_secs(settle),
                )
                .await
            }
            Commands::Config { .. } => Ok(()),
        };

        store.shutdown().await;
        result
    }

    /// Print the effective configuration, optionally saving it
    fn handle_config_command(config: &AppConfig, write: bool) -> Result<()> {
        print!("{}", config.to_toml()?);

        if write {
            let path = AppConfig::default_config_path()
                .ok_or_else(|| CliError::Config("No home directory".to_string()))?;
            config.save_to_file(&path)?;
            println!("# written to {}", path.display());
        }
        Ok(())
    }

    /// Scan for `duration` (or until Ctrl+C) and list what was found
    async fn handle_scan_command<C: BleCentral>(
        store: &WeightStore<C>,
        duration: Duration,
    ) -> Result<()> {
        info!("Scanning for {}s... Press Ctrl+C to stop", duration.as_secs());
        store.scan_devices().await?;

        tokio::select! {
            _ = sleep(duration) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        store.stop_scan().await;

        let devices = store.devices();
        if devices.is_empty() {
            println!("No scales found");
            return Ok(());
        }

        println!("{:<40} {:<24} {:>6}", "ID", "NAME", "RSSI");
        for device in devices {
            let rssi = device
                .rssi
                .map(|rssi| rssi.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<40} {:<24} {:>6}", device.id, device.display_name(), rssi);
        }
        Ok(())
    }

    /// Connect and print every weight change
    async fn handle_weigh_command<C: BleCentral>(
        store: &WeightStore<C>,
        device_id: DeviceId,
        discovery: Duration,
        samples: Option<usize>,
    ) -> Result<()> {
        let device = discover(store, &device_id, discovery).await?;
        store.connect_device(&device).await?;
        println!("Connected to {}. Press Ctrl+C to stop", device);

        let mut updates = store.subscribe();
        tokio::select! {
            lost = follow_weights(&mut updates, samples, |grams| println!("{}", grams)) => {
                if lost {
                    warn!("Connection to {} ended", device);
                }
            }
            _ = tokio::signal::ctrl_c() => {}
        }
        Ok(())
    }

    /// Wait for a settled reading and print it as a food log entry
    async fn handle_log_command<C: BleCentral>(
        store: &WeightStore<C>,
        device_id: DeviceId,
        discovery: Duration,
        food: String,
        settle: Duration,
    ) -> Result<()> {
        let device = discover(store, &device_id, discovery).await?;
        store.connect_device(&device).await?;
        info!("Waiting for {} to settle", device);

        let mut updates = store.subscribe();
        let grams = settled_weight(&mut updates, settle, discovery + settle * 5)
            .await
            .ok_or_else(|| CliError::NoReading(device.to_string()))?;

        let entry = FoodLogEntry::now(food, grams);
        println!("{}", serde_json::to_string_pretty(&entry)?);
        Ok(())
    }
}

/// Scan until `device_id` shows up in the device list
async fn discover<C: BleCentral>(
    store: &WeightStore<C>,
    device_id: &DeviceId,
    limit: Duration,
) -> Result<PeripheralDevice> {
    let find = |snapshot: &StoreSnapshot| {
        snapshot
            .devices
            .iter()
            .find(|device| device.id == *device_id)
            .cloned()
    };

    let mut updates = store.subscribe();
    store.scan_devices().await?;
    info!("Looking for {}", device_id);

    let search = async {
        loop {
            if let Some(device) = find(&updates.borrow_and_update()) {
                return Some(device);
            }
            if updates.changed().await.is_err() {
                return None;
            }
        }
    };

    match timeout(limit, search).await {
        Ok(Some(device)) => Ok(device),
        _ => {
            store.stop_scan().await;
            Err(CliError::DeviceNotFound {
                device_id: device_id.to_string(),
                secs: limit.as_secs(),
            })
        }
    }
}

/// Pass every new reading to `report`, starting with the current one, until
/// `samples` readings were reported. Returns `true` when the connection ended
/// first.
async fn follow_weights(
    updates: &mut watch::Receiver<StoreSnapshot>,
    samples: Option<usize>,
    mut report: impl FnMut(Grams),
) -> bool {
    let mut last = None;
    let mut reported = 0;

    loop {
        let snapshot = updates.borrow_and_update().clone();
        if !snapshot.is_connected() {
            return true;
        }
        if let Some(grams) = snapshot.weight.filter(|grams| Some(*grams) != last) {
            last = Some(grams);
            report(grams);
            reported += 1;
        }
        if samples.map_or(false, |limit| reported >= limit) {
            return false;
        }
        if updates.changed().await.is_err() {
            return true;
        }
    }
}

/// The first reading that stays unchanged for `settle`, giving up after
/// `limit` or when the connection ends
async fn settled_weight(
    updates: &mut watch::Receiver<StoreSnapshot>,
    settle: Duration,
    limit: Duration,
) -> Option<Grams> {
    let deadline = Instant::now() + limit;
    let mut candidate = {
        let snapshot = updates.borrow_and_update();
        if !snapshot.is_connected() {
            return None;
        }
        snapshot.weight
    };

    loop {
        let wait = if candidate.is_some() { settle } else { limit };
        let started = Instant::now();
        let waited_fully = started + wait <= deadline;

        match tokio::time::timeout_at((started + wait).min(deadline), updates.changed()).await {
            Err(_) => return candidate.filter(|_| waited_fully),
            Ok(Err(_)) => return None,
            Ok(Ok(())) => {
                let snapshot = updates.borrow_and_update().clone();
                if !snapshot.is_connected() {
                    return None;
                }
                candidate = snapshot.weight;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(weight: Option<i64>) -> StoreSnapshot {
        StoreSnapshot {
            connected_device: Some(PeripheralDevice::new("AA:BB", None)),
            weight: weight.map(Grams::new),
            ..StoreSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_follow_weights_reports_current_reading_first() {
        let (tx, mut rx) = watch::channel(connected(Some(245)));
        let (seen_tx, mut seen) = tokio::sync::mpsc::unbounded_channel();

        let follower = tokio::spawn(async move {
            follow_weights(&mut rx, Some(2), |grams| {
                let _ = seen_tx.send(grams);
            })
            .await
        });

        assert_eq!(seen.recv().await, Some(Grams::new(245)));
        tx.send(connected(Some(245))).unwrap();
        tx.send(connected(Some(300))).unwrap();

        assert_eq!(seen.recv().await, Some(Grams::new(300)));
        assert!(!follower.await.unwrap());
    }

    #[tokio::test]
    async fn test_follow_weights_stops_on_disconnect() {
        let (tx, mut rx) = watch::channel(connected(None));

        let follower = tokio::spawn(async move { follow_weights(&mut rx, None, |_| ()).await });
        tx.send(StoreSnapshot::default()).unwrap();

        assert!(follower.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_weight_waits_for_stable_reading() {
        let (tx, mut rx) = watch::channel(connected(None));

        let reader = tokio::spawn(async move {
            settled_weight(&mut rx, Duration::from_secs(2), Duration::from_secs(30)).await
        });

        tx.send(connected(Some(100))).unwrap();
        sleep(Duration::from_secs(1)).await;
        tx.send(connected(Some(245))).unwrap();

        assert_eq!(reader.await.unwrap(), Some(Grams::new(245)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_weight_gives_up_without_reading() {
        let (_tx, mut rx) = watch::channel(connected(None));
        let grams = settled_weight(&mut rx, Duration::from_secs(2), Duration::from_secs(10)).await;
        assert_eq!(grams, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_weight_stops_on_disconnect() {
        let (tx, mut rx) = watch::channel(connected(Some(10)));

        let reader = tokio::spawn(async move {
            settled_weight(&mut rx, Duration::from_secs(2), Duration::from_secs(30)).await
        });
        tx.send(StoreSnapshot::default()).unwrap();

        assert_eq!(reader.await.unwrap(), None);
    }
}
