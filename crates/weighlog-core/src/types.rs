//! Core data model: devices, weights and store snapshots

use core::fmt;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Device Identity
// ----------------------------------------------------------------------------

/// Stable identifier of a physical peripheral as reported by the central
///
/// On Linux this is the adapter path of the device, on Android and Windows the
/// MAC address, on macOS a per-host UUID. The store only compares and displays
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ----------------------------------------------------------------------------
// Peripheral Device
// ----------------------------------------------------------------------------

/// A peripheral observed while scanning
///
/// The platform handle stays inside the central implementation; the store
/// refers to the device by `id` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralDevice {
    /// Stable identifier
    pub id: DeviceId,
    /// Advertised local name, if any
    pub name: Option<String>,
    /// Signal strength of the last advertisement, if known
    pub rssi: Option<i16>,
}

impl PeripheralDevice {
    /// Create a device with an optional advertised name
    pub fn new(id: impl Into<DeviceId>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            rssi: None,
        }
    }

    /// Attach a signal strength reading
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Name to show to the user
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown device")
    }
}

impl fmt::Display for PeripheralDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.id)
    }
}

// ----------------------------------------------------------------------------
// Weight Reading
// ----------------------------------------------------------------------------

/// A weight reading in grams
///
/// Signed because scales report negative values after taring with a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grams(i64);

impl Grams {
    /// Create a reading from a gram value
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Raw gram value
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Grams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} g", self.0)
    }
}

impl From<Grams> for i64 {
    fn from(grams: Grams) -> Self {
        grams.0
    }
}

// ----------------------------------------------------------------------------
// Store Snapshot
// ----------------------------------------------------------------------------

/// Everything a consumer can observe about the weight store at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Devices discovered since the last scan started, in discovery order
    pub devices: Vec<PeripheralDevice>,
    /// Device of the active connection
    pub connected_device: Option<PeripheralDevice>,
    /// Latest decoded weight of the active connection
    pub weight: Option<Grams>,
    /// Whether a scan is currently running
    pub scanning: bool,
}

impl StoreSnapshot {
    /// Whether a device is connected
    pub fn is_connected(&self) -> bool {
        self.connected_device.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back() {
        let named = PeripheralDevice::new("AA:BB", Some("Scale1".to_string()));
        let unnamed = PeripheralDevice::new("CC:DD", None);

        assert_eq!(named.display_name(), "Scale1");
        assert_eq!(unnamed.display_name(), "Unknown device");
        assert_eq!(named.to_string(), "Scale1 (AA:BB)");
    }

    #[test]
    fn test_grams_serializes_as_plain_number() {
        let json = serde_json::to_string(&Grams::new(245)).unwrap();
        assert_eq!(json, "245");
        assert_eq!(Grams::new(-12).to_string(), "-12 g");
    }
}
