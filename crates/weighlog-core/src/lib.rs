//! weighlog core: live weight from Bluetooth Low Energy kitchen scales
//!
//! This crate holds everything between a BLE central and the screens that log
//! food by weight: permission negotiation, device discovery, the single active
//! connection and the characteristic monitor that turns notifications into a
//! weight in grams.
//!
//! ## Architecture
//!
//! - [`permissions`] - Runtime permission strategy per platform
//! - [`central`] - The [`BleCentral`] seam implemented by platform crates
//! - [`codec`] - Characteristic payload decoding
//! - [`monitor`] - Notification stream to weight stream
//! - [`store`] - The shared [`WeightStore`] consumers read and control
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weighlog_core::WeightStore;
//!
//! let store = WeightStore::new(Arc::new(central))?;
//! if store.request_permissions().await {
//!     store.scan_devices().await?;
//!     // ... user picks a device from store.devices()
//!     store.connect_device(&device).await?;
//!     let grams = store.weight();
//! }
//! store.shutdown().await;
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod central;
pub mod codec;
pub mod config;
pub mod errors;
pub mod monitor;
pub mod permissions;
pub mod store;
pub mod types;

mod connection;
mod scanner;
mod state;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use central::{BleCentral, NotificationStream, ScanEventStream, ScanFilter};
pub use codec::{decode_weight, Payload};
pub use config::{ScaleConfig, DEFAULT_CHARACTERISTIC_UUID, DEFAULT_SERVICE_UUID};
pub use errors::{DecodeError, Result, ScaleError};
pub use monitor::{weight_stream, CharacteristicMonitor};
pub use permissions::{
    AlwaysGranted, Permission, PermissionBackend, PermissionNegotiator, PermissionStatus,
    PermissionStrategy, Platform, Rationale,
};
pub use store::{WeightStore, WeightStoreBuilder};
pub use types::{DeviceId, Grams, PeripheralDevice, StoreSnapshot};
