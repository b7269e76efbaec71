//! weighlog CLI configuration
//!
//! Loaded from the file given with `--config`, otherwise from
//! `~/.weighlog/config.toml` when it exists, otherwise defaults. Missing keys
//! fall back to their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use weighlog_ble::BleCentralConfig;
use weighlog_core::{Platform, ScaleConfig};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How long `weigh` and `log` scan for the requested device
    pub discovery_timeout_secs: u64,
    /// Scale identification and connect behaviour
    pub scale: ScaleConfig,
    /// Adapter selection
    pub ble: BleCentralConfig,
    /// Host platform, selects the permission flow
    pub platform: Platform,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: 10,
            scale: ScaleConfig::default(),
            ble: BleCentralConfig::default(),
            platform: Platform::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path),
                _ => {
                    debug!("No configuration file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.weighlog/config.toml`, if a home directory is known
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".weighlog").join("config.toml"))
    }

    /// Save configuration to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        self.scale
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;

        if self.discovery_timeout_secs == 0 {
            return Err(CliError::Config(
                "Discovery timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
