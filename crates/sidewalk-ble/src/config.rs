//! BLE adapter configuration

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration handed to the adapter's `init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Name advertised by the device
    pub device_name: String,
    /// Advertising interval in milliseconds
    pub adv_interval_ms: u32,
    /// Restore bonding and service configuration from persistent settings
    pub load_settings: bool,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            device_name: "Sidewalk".to_string(),
            adv_interval_ms: 160,
            load_settings: true,
        }
    }
}

impl BleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_adv_interval_ms(mut self, interval: u32) -> Self {
        self.adv_interval_ms = interval;
        self
    }
}
