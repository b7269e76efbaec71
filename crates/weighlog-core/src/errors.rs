//! Error types for the weighlog core
//!
//! `ScaleError` covers everything that can go wrong between the store and the
//! BLE central. `DecodeError` is kept separate because notification decode
//! failures are never surfaced to callers, only logged.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors produced by the weight store and the BLE central seam
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScaleError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Failed to connect to {device_id}: {reason}")]
    ConnectionFailed { device_id: String, reason: String },

    #[error("Connection to {device_id} timed out after {duration_ms}ms")]
    ConnectionTimeout { device_id: String, duration_ms: u64 },

    #[error("Connection to {device_id} was aborted")]
    ConnectionAborted { device_id: String },

    #[error("Failed to discover services: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Permission request failed: {0}")]
    Permission(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Weight store has been shut down")]
    StoreShutDown,
}

/// Reasons a characteristic payload could not be turned into a weight
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("payload is not a number: {0:?}")]
    NotANumber(String),

    #[error("weight out of range: {0:?}")]
    OutOfRange(String),
}

/// Result type for weighlog core operations
pub type Result<T> = std::result::Result<T, ScaleError>;

impl ScaleError {
    /// Create a connection failure for a device
    pub fn connection_failed(device_id: impl ToString, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            device_id: device_id.to_string(),
            reason: reason.to_string(),
        }
    }
}
