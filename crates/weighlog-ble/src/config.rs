//! btleplug central configuration

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the btleplug central
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleCentralConfig {
    /// Index into the adapters reported by the OS
    pub adapter_index: usize,
    /// Report `DeviceUpdated` events as discoveries too. Scales that only
    /// advertise their name in the scan response are otherwise listed
    /// without one or, with a name prefix configured, not at all.
    pub report_updates: bool,
}

impl Default for BleCentralConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            report_updates: true,
        }
    }
}

impl BleCentralConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the adapter at `index`
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Enable or disable reporting of updated advertisements
    pub fn with_report_updates(mut self, enabled: bool) -> Self {
        self.report_updates = enabled;
        self
    }
}
