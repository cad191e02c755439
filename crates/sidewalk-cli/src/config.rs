//! CLI Configuration
//!
//! One TOML file carries the device runtime configuration, the BLE adapter
//! configuration and a few CLI settings:
//!
//! ```toml
//! [device]
//! link_mask = 1
//! persistent_link_mask = true
//!
//! [device.file_transfer]
//! enabled = true
//! dfu = true
//!
//! [ble]
//! device_name = "sid-sim"
//!
//! [cli]
//! log_level = "debug"
//! ```
//!
//! Missing sections and fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sidewalk_ble::BleConfig;
use sidewalk_core::DeviceConfig;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub ble: BleConfig,
    pub cli: CliSettings,
}

/// CLI-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// Log filter directive (e.g. "info", "sidewalk_runtime=debug"); `--verbose` wins
    pub log_level: Option<String>,
    /// How long to wait for outstanding acknowledgments, in milliseconds
    pub ack_timeout_ms: u64,
    /// Size of the simulated file-transfer chunk sent when file transfer is enabled
    pub transfer_chunk_size: usize,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            log_level: None,
            ack_timeout_ms: 2000,
            transfer_chunk_size: 64,
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        if self.ble.device_name.is_empty() {
            return Err(CliError::Config("ble.device_name must not be empty".into()));
        }
        if self.cli.ack_timeout_ms == 0 {
            return Err(CliError::Config("cli.ack_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidewalk_core::LinkMask;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.device.link_mask, LinkMask::BLE);
        assert_eq!(config.ble, BleConfig::default());
        assert_eq!(config.cli.ack_timeout_ms, 2000);
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [device]
            link_mask = 2
            persistent_link_mask = true

            [device.auto_connect]
            enabled = true

            [ble]
            device_name = "sid-sim"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.link_mask, LinkMask::FSK);
        assert!(config.device.persistent_link_mask);
        assert!(config.device.auto_connect.enabled);
        assert_eq!(config.device.auto_connect.connection_attempt_timeout_secs, 30);
        assert_eq!(config.ble.device_name, "sid-sim");
    }

    #[test]
    fn invalid_device_config_is_a_configuration_error() {
        let err = AppConfig::from_toml_str("[device]\nevent_queue_size = 0\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = AppConfig::from_toml_str("[device\n").unwrap_err();
        assert!(matches!(err, CliError::TomlParsing(_)));
    }

    #[test]
    fn serialized_config_loads_back() {
        let mut config = AppConfig::default();
        config.device.link_mask = LinkMask::BLE | LinkMask::LORA;

        let text = config.to_toml_string().unwrap();
        let loaded = AppConfig::from_toml_str(&text).unwrap();
        assert_eq!(loaded.device.link_mask, config.device.link_mask);
    }
}
