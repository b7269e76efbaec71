//! Runtime permission negotiation
//!
//! Scanning needs OS permissions on platforms with a runtime permission model.
//! Which permissions depends on the platform API level: before API level 31
//! only fine location is required, from 31 on Bluetooth scan and connect are
//! requested alongside it. The strategy is picked once from the detected
//! [`Platform`] and kept for the lifetime of the negotiator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::Result;

/// First API level with dedicated Bluetooth scan/connect permissions
pub const BLUETOOTH_PERMISSIONS_API_LEVEL: u32 = 31;

// ----------------------------------------------------------------------------
// Platform Detection
// ----------------------------------------------------------------------------

/// Platform the central runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Platform {
    /// Desktop hosts (BlueZ, CoreBluetooth, WinRT) without a runtime dialog
    #[default]
    Desktop,
    /// iOS, where Bluetooth access is declared up front
    Ios,
    /// Android with its runtime permission system
    Android { api_level: u32 },
}

/// Permission flow selected for a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStrategy {
    /// No runtime permissions, requests succeed immediately
    NotRequired,
    /// Fine location only
    LegacyLocation,
    /// Bluetooth scan, Bluetooth connect and fine location
    BluetoothAndLocation,
}

impl PermissionStrategy {
    /// Select the flow for a platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Desktop | Platform::Ios => PermissionStrategy::NotRequired,
            Platform::Android { api_level } if api_level < BLUETOOTH_PERMISSIONS_API_LEVEL => {
                PermissionStrategy::LegacyLocation
            }
            Platform::Android { .. } => PermissionStrategy::BluetoothAndLocation,
        }
    }

    /// Permissions this flow asks for
    pub fn required_permissions(self) -> &'static [Permission] {
        match self {
            PermissionStrategy::NotRequired => &[],
            PermissionStrategy::LegacyLocation => &[Permission::AccessFineLocation],
            PermissionStrategy::BluetoothAndLocation => &[
                Permission::BluetoothScan,
                Permission::BluetoothConnect,
                Permission::AccessFineLocation,
            ],
        }
    }
}

// ----------------------------------------------------------------------------
// Permissions
// ----------------------------------------------------------------------------

/// OS permissions involved in scanning and connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    AccessFineLocation,
    BluetoothScan,
    BluetoothConnect,
}

impl Permission {
    /// Identifier passed to the OS permission layer
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::AccessFineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Permission::BluetoothScan => "android.permission.BLUETOOTH_SCAN",
            Permission::BluetoothConnect => "android.permission.BLUETOOTH_CONNECT",
        }
    }
}

/// Outcome of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Denied with "don't ask again"; only the settings screen can change it
    NeverAskAgain,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Explanation shown to the user alongside a permission dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rationale {
    pub title: String,
    pub message: String,
    pub button_positive: String,
    pub button_negative: Option<String>,
    pub button_neutral: Option<String>,
}

impl Default for Rationale {
    fn default() -> Self {
        Self {
            title: "Location Permission".to_string(),
            message: "Bluetooth scanning requires access to your location \
                      so nearby scales can be found."
                .to_string(),
            button_positive: "OK".to_string(),
            button_negative: Some("Cancel".to_string()),
            button_neutral: Some("Ask Me Later".to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Permission Backend
// ----------------------------------------------------------------------------

/// Access to the OS permission layer
#[async_trait]
pub trait PermissionBackend: Send + Sync {
    /// Request a single permission, showing `rationale` first
    async fn request(&self, permission: Permission, rationale: &Rationale)
        -> Result<PermissionStatus>;

    /// Request several permissions in one dialog sequence
    async fn request_multiple(
        &self,
        permissions: &[Permission],
    ) -> Result<Vec<(Permission, PermissionStatus)>>;
}

/// Backend for hosts where the OS never prompts at runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl PermissionBackend for AlwaysGranted {
    async fn request(
        &self,
        _permission: Permission,
        _rationale: &Rationale,
    ) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn request_multiple(
        &self,
        permissions: &[Permission],
    ) -> Result<Vec<(Permission, PermissionStatus)>> {
        Ok(permissions
            .iter()
            .map(|permission| (*permission, PermissionStatus::Granted))
            .collect())
    }
}

// ----------------------------------------------------------------------------
// Negotiator
// ----------------------------------------------------------------------------

/// Resolves the permissions needed before a scan may start
#[derive(Clone)]
pub struct PermissionNegotiator {
    strategy: PermissionStrategy,
    backend: Arc<dyn PermissionBackend>,
    rationale: Rationale,
}

impl PermissionNegotiator {
    /// Create a negotiator, selecting the strategy for `platform`
    pub fn new(
        platform: Platform,
        backend: Arc<dyn PermissionBackend>,
        rationale: Rationale,
    ) -> Self {
        let strategy = PermissionStrategy::for_platform(platform);
        debug!("Permission strategy for {:?}: {:?}", platform, strategy);
        Self {
            strategy,
            backend,
            rationale,
        }
    }

    /// Strategy selected at construction
    pub fn strategy(&self) -> PermissionStrategy {
        self.strategy
    }

    /// Ask for every permission the strategy needs.
    ///
    /// Returns `false` when any permission is refused or the request itself
    /// fails; scanning must not start in that case.
    pub async fn request_permissions(&self) -> bool {
        match self.strategy {
            PermissionStrategy::NotRequired => true,
            PermissionStrategy::LegacyLocation => {
                match self
                    .backend
                    .request(Permission::AccessFineLocation, &self.rationale)
                    .await
                {
                    Ok(status) => {
                        info!("Location permission: {:?}", status);
                        status.is_granted()
                    }
                    Err(e) => {
                        warn!("Location permission request failed: {}", e);
                        false
                    }
                }
            }
            PermissionStrategy::BluetoothAndLocation => {
                let required = self.strategy.required_permissions();
                match self.backend.request_multiple(required).await {
                    Ok(results) => {
                        let granted = required.iter().all(|permission| {
                            results
                                .iter()
                                .any(|(p, status)| p == permission && status.is_granted())
                        });
                        if !granted {
                            warn!("Bluetooth permissions not granted: {:?}", results);
                        }
                        granted
                    }
                    Err(e) => {
                        warn!("Bluetooth permission request failed: {}", e);
                        false
                    }
                }
            }
        }
    }
}
