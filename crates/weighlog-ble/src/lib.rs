//! Bluetooth Low Energy central for weighlog
//!
//! This crate implements the `BleCentral` trait from `weighlog-core` on top of
//! btleplug, so the weight store can scan for, connect to and monitor real
//! scales on Linux, macOS and Windows.
//!
//! ## Architecture
//!
//! - [`config`] - Adapter selection and scan reporting
//! - [`error`] - Error types specific to the btleplug central
//! - [`peripheral`] - Advertisement mapping and the peripheral registry
//! - [`central`] - The `BleCentral` implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weighlog_ble::{BleCentralConfig, BtleplugCentral};
//! use weighlog_core::WeightStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let central = BtleplugCentral::new(BleCentralConfig::new()).await?;
//! let store = WeightStore::new(Arc::new(central))?;
//!
//! store.scan_devices().await?;
//! # Ok(())
//! # }
//! ```

pub mod central;
pub mod config;
pub mod error;
pub mod peripheral;

// Public API exports
pub use central::BtleplugCentral;
pub use config::BleCentralConfig;
pub use error::BleCentralError;
pub use peripheral::PeripheralRegistry;

// Re-export the central trait for convenience
pub use weighlog_core::BleCentral;
