//! Scale configuration
//!
//! Identifies the scale on the air (service and characteristic UUIDs, optional
//! name prefix) and bounds how long a connect attempt may take.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, ScaleError};

// ----------------------------------------------------------------------------
// Default UUIDs
// ----------------------------------------------------------------------------

/// Service advertised by HM-10 style UART bridges used in kitchen scales
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000FFE0_0000_1000_8000_00805F9B34FB);

/// Notifying characteristic carrying the weight in grams as decimal text
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000FFE1_0000_1000_8000_00805F9B34FB);

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for discovering and monitoring a scale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Service the scale advertises
    pub service_uuid: Uuid,
    /// Characteristic that notifies weight readings
    pub characteristic_uuid: Uuid,
    /// Restrict scans to peripherals advertising `service_uuid`
    pub filter_by_service: bool,
    /// Only list devices whose advertised name starts with this prefix
    pub name_prefix: Option<String>,
    /// Give up on a connect attempt after this many seconds.
    /// `None` leaves timeouts to the platform.
    pub connection_timeout_secs: Option<u64>,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            service_uuid: DEFAULT_SERVICE_UUID,
            characteristic_uuid: DEFAULT_CHARACTERISTIC_UUID,
            filter_by_service: true,
            name_prefix: None,
            connection_timeout_secs: None,
        }
    }
}

impl ScaleConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service UUID
    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = uuid;
        self
    }

    /// Set the weight characteristic UUID
    pub fn with_characteristic_uuid(mut self, uuid: Uuid) -> Self {
        self.characteristic_uuid = uuid;
        self
    }

    /// Enable or disable filtering scans by service
    pub fn with_service_filter(mut self, enabled: bool) -> Self {
        self.filter_by_service = enabled;
        self
    }

    /// Set the device name prefix
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Set the connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Connection timeout as a duration
    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout_secs.map(Duration::from_secs)
    }

    /// Whether a device with this advertised name should be listed
    pub fn accepts_name(&self, name: Option<&str>) -> bool {
        match (&self.name_prefix, name) {
            (None, _) => true,
            (Some(prefix), Some(name)) => name.starts_with(prefix.as_str()),
            (Some(_), None) => false,
        }
    }

    /// Check the configuration for contradictions
    pub fn validate(&self) -> Result<()> {
        if self.service_uuid == self.characteristic_uuid {
            return Err(ScaleError::Config(
                "service and characteristic UUIDs must differ".to_string(),
            ));
        }
        if self.connection_timeout_secs == Some(0) {
            return Err(ScaleError::Config(
                "connection timeout must be at least one second".to_string(),
            ));
        }
        if matches!(&self.name_prefix, Some(prefix) if prefix.is_empty()) {
            return Err(ScaleError::Config("name prefix must not be empty".to_string()));
        }
        Ok(())
    }
}
