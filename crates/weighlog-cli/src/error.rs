//! Error handling for the weighlog CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Scale error: {0}")]
    Scale(#[from] weighlog_core::ScaleError),

    #[error("BLE error: {0}")]
    Ble(#[from] weighlog_ble::BleCentralError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bluetooth permissions were not granted")]
    PermissionDenied,

    #[error("Device {device_id} not seen within {secs}s")]
    DeviceNotFound { device_id: String, secs: u64 },

    #[error("No weight reading from {0}")]
    NoReading(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlWriting(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
