//! Device Configuration
//!
//! Optional subsystems (persistent link mask, auto-connect, file transfer,
//! DFU) are switched by run-time flags that the runtime builder threads
//! through to the event dispatcher.

use serde::{Deserialize, Serialize};

use crate::errors::{SidError, SidResult};
use crate::types::{AutoConnectParams, LinkMask, LinkType};

// ----------------------------------------------------------------------------
// Manufacturing Region
// ----------------------------------------------------------------------------

/// Flash region holding the manufacturing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashRegion {
    pub start: u32,
    pub size: u32,
}

impl FlashRegion {
    pub const fn end(&self) -> u32 {
        self.start.saturating_add(self.size)
    }
}

impl Default for FlashRegion {
    fn default() -> Self {
        Self {
            start: 0x000F_F000,
            size: 0x0000_1000,
        }
    }
}

// ----------------------------------------------------------------------------
// Auto-connect
// ----------------------------------------------------------------------------

/// Auto-connect policy applied to the BLE link after every stack start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoConnectConfig {
    pub enabled: bool,
    pub priority: u8,
    pub connection_attempt_timeout_secs: u16,
}

impl Default for AutoConnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 0,
            connection_attempt_timeout_secs: 30,
        }
    }
}

impl AutoConnectConfig {
    /// Parameters passed to the stack's auto-connect option
    pub fn params(&self) -> AutoConnectParams {
        AutoConnectParams {
            link_type: LinkType::Ble,
            enable: true,
            priority: self.priority,
            connection_attempt_timeout_secs: self.connection_attempt_timeout_secs,
        }
    }
}

// ----------------------------------------------------------------------------
// File Transfer
// ----------------------------------------------------------------------------

/// Bulk data transfer support
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTransferConfig {
    /// Run a file-transfer session alongside the stack
    pub enabled: bool,
    /// Stage received chunks into firmware storage
    pub dfu: bool,
}

// ----------------------------------------------------------------------------
// Device Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of the end-device runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Link mask used when nothing is persisted
    pub link_mask: LinkMask,
    /// Restore and persist the link mask through the settings store
    pub persistent_link_mask: bool,
    pub auto_connect: AutoConnectConfig,
    pub file_transfer: FileTransferConfig,
    pub mfg_region: FlashRegion,
    /// Capacity of the event queue feeding the dispatcher
    pub event_queue_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            link_mask: LinkMask::DEFAULT,
            persistent_link_mask: false,
            auto_connect: AutoConnectConfig::default(),
            file_transfer: FileTransferConfig::default(),
            mfg_region: FlashRegion::default(),
            event_queue_size: 32,
        }
    }
}

impl DeviceConfig {
    /// Configuration with every optional subsystem switched on
    pub fn full_featured() -> Self {
        Self {
            persistent_link_mask: true,
            auto_connect: AutoConnectConfig {
                enabled: true,
                ..AutoConnectConfig::default()
            },
            file_transfer: FileTransferConfig {
                enabled: true,
                dfu: true,
            },
            ..Self::default()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> SidResult<()> {
        if self.event_queue_size == 0 {
            return Err(SidError::config_error("event_queue_size must be non-zero"));
        }
        if self.mfg_region.size == 0 {
            return Err(SidError::config_error("mfg_region.size must be non-zero"));
        }
        if self.file_transfer.dfu && !self.file_transfer.enabled {
            return Err(SidError::config_error(
                "file_transfer.dfu requires file_transfer.enabled",
            ));
        }
        Ok(())
    }
}
