//! Error types for the btleplug central

use thiserror::Error;
use weighlog_core::ScaleError;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while driving btleplug
#[derive(Error, Debug)]
pub enum BleCentralError {
    #[error("Failed to create BLE manager: {0}")]
    Manager(String),

    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Failed to get BLE events: {0}")]
    EventStreamFailed(String),

    #[error("Failed to start BLE scan: {0}")]
    ScanFailed(String),

    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Failed to connect to {device_id}: {reason}")]
    ConnectionFailed { device_id: String, reason: String },

    #[error("Failed to disconnect from {device_id}: {reason}")]
    DisconnectFailed { device_id: String, reason: String },

    #[error("Failed to discover services: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to get notifications stream: {0}")]
    NotificationStreamFailed(String),
}

impl From<BleCentralError> for ScaleError {
    fn from(err: BleCentralError) -> Self {
        match err {
            BleCentralError::Manager(_) | BleCentralError::AdapterNotAvailable => {
                ScaleError::AdapterNotAvailable
            }
            BleCentralError::EventStreamFailed(reason) | BleCentralError::ScanFailed(reason) => {
                ScaleError::Scan(reason)
            }
            BleCentralError::DeviceNotFound { device_id } => {
                ScaleError::DeviceNotFound { device_id }
            }
            BleCentralError::ConnectionFailed { device_id, reason }
            | BleCentralError::DisconnectFailed { device_id, reason } => {
                ScaleError::ConnectionFailed { device_id, reason }
            }
            BleCentralError::ServiceDiscoveryFailed(reason) => {
                ScaleError::ServiceDiscoveryFailed(reason)
            }
            BleCentralError::CharacteristicNotFound { characteristic } => {
                ScaleError::CharacteristicNotFound { characteristic }
            }
            BleCentralError::SubscriptionFailed(reason)
            | BleCentralError::NotificationStreamFailed(reason) => {
                ScaleError::SubscriptionFailed(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_errors_map_to_adapter_unavailable() {
        let err: ScaleError = BleCentralError::Manager("dbus".to_string()).into();
        assert_eq!(err, ScaleError::AdapterNotAvailable);
    }

    #[test]
    fn test_missing_characteristic_keeps_uuid() {
        let err: ScaleError = BleCentralError::CharacteristicNotFound {
            characteristic: "0000ffe1".to_string(),
        }
        .into();
        assert_eq!(
            err,
            ScaleError::CharacteristicNotFound {
                characteristic: "0000ffe1".to_string()
            }
        );
    }
}
