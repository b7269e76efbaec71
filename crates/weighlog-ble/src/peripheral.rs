//! Mapping btleplug peripherals onto store devices

use std::collections::HashMap;

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use uuid::Uuid;
use weighlog_core::{DeviceId, PeripheralDevice};

// ----------------------------------------------------------------------------
// Advertisement Mapping
// ----------------------------------------------------------------------------

/// Store identifier of a btleplug peripheral
pub fn device_id(peripheral: &Peripheral) -> DeviceId {
    DeviceId::new(peripheral.id().to_string())
}

/// Build the device entry reported for an advertisement
pub fn advertised_device(
    id: DeviceId,
    local_name: Option<String>,
    rssi: Option<i16>,
) -> PeripheralDevice {
    let device = PeripheralDevice::new(id, local_name.filter(|name| !name.trim().is_empty()));
    match rssi {
        Some(rssi) => device.with_rssi(rssi),
        None => device,
    }
}

/// Whether an advertisement satisfies the scan filter. Some platforms ignore
/// the service filter passed to the adapter, so it is checked again here.
pub fn matches_services(wanted: &[Uuid], advertised: &[Uuid]) -> bool {
    wanted.is_empty() || wanted.iter().any(|uuid| advertised.contains(uuid))
}

// ----------------------------------------------------------------------------
// Peripheral Registry
// ----------------------------------------------------------------------------

/// Peripheral handles seen by scans, looked up by device identifier
#[derive(Debug, Default)]
pub struct PeripheralRegistry {
    peripherals: HashMap<DeviceId, Peripheral>,
}

impl PeripheralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: DeviceId, peripheral: Peripheral) {
        self.peripherals.insert(id, peripheral);
    }

    pub fn get(&self, id: &DeviceId) -> Option<Peripheral> {
        self.peripherals.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE_SERVICE: Uuid = Uuid::from_u128(0x0000FFE0_0000_1000_8000_00805F9B34FB);

    #[test]
    fn test_blank_names_are_dropped() {
        let device = advertised_device(DeviceId::from("AA:BB"), Some("  ".to_string()), None);
        assert_eq!(device.name, None);
        assert_eq!(device.display_name(), "Unknown device");
    }

    #[test]
    fn test_rssi_is_kept() {
        let name = Some("Scale1".to_string());
        let device = advertised_device(DeviceId::from("AA:BB"), name, Some(-61));
        assert_eq!(device.name.as_deref(), Some("Scale1"));
        assert_eq!(device.rssi, Some(-61));
    }

    #[test]
    fn test_service_matching() {
        assert!(matches_services(&[], &[]));
        assert!(matches_services(&[SCALE_SERVICE], &[Uuid::nil(), SCALE_SERVICE]));
        assert!(!matches_services(&[SCALE_SERVICE], &[]));
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = PeripheralRegistry::new();
        assert!(registry.get(&DeviceId::from("AA:BB")).is_none());
    }
}
