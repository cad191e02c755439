//! Optional subsystems consumed by the runtime
//!
//! Each subsystem is a capability trait with a no-op implementation used when
//! the subsystem is switched off in [`DeviceConfig`](crate::config::DeviceConfig).

use tracing::{error, info};

use crate::errors::SidResult;
use crate::types::{LinkMask, StackHandle};

// ----------------------------------------------------------------------------
// Persistent Link Mask
// ----------------------------------------------------------------------------

/// Persistent storage of the selected link mask
pub trait LinkMaskStore: Send {
    /// Stored mask, `None` if nothing was ever stored
    fn load_link_mask(&self) -> SidResult<Option<LinkMask>>;

    fn store_link_mask(&mut self, mask: LinkMask) -> SidResult<()>;
}

/// Store that never persists anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLinkMaskStore;

impl LinkMaskStore for NoLinkMaskStore {
    fn load_link_mask(&self) -> SidResult<Option<LinkMask>> {
        Ok(None)
    }

    fn store_link_mask(&mut self, _mask: LinkMask) -> SidResult<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Manufacturing Configuration
// ----------------------------------------------------------------------------

/// Access to the manufacturing configuration
pub trait MfgStore: Send {
    /// Check that the stored configuration matches the expected version
    fn validate(&self) -> SidResult<()>;
}

/// Manufacturing store that always validates
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidMfgStore;

impl MfgStore for ValidMfgStore {
    fn validate(&self) -> SidResult<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Firmware Staging
// ----------------------------------------------------------------------------

/// Firmware image staging area
pub trait FirmwareStaging: Send {
    fn write(&mut self, offset: u32, data: &[u8]) -> SidResult<()>;

    /// Abort an in-progress image write
    fn cancel(&mut self) -> SidResult<()>;

    /// Mark the running image as good
    fn confirm_image(&mut self) -> SidResult<()>;
}

/// Staging area for builds without firmware update support
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFirmware;

impl FirmwareStaging for NoFirmware {
    fn write(&mut self, _offset: u32, _data: &[u8]) -> SidResult<()> {
        Ok(())
    }

    fn cancel(&mut self) -> SidResult<()> {
        Ok(())
    }

    fn confirm_image(&mut self) -> SidResult<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File Transfer Session
// ----------------------------------------------------------------------------

/// Bulk data transfer session layered on top of a stack instance
pub trait FileTransferSession: Send {
    fn init(&mut self, handle: StackHandle);

    fn deinit(&mut self, handle: StackHandle);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFileTransfer;

impl FileTransferSession for NoFileTransfer {
    fn init(&mut self, _handle: StackHandle) {}

    fn deinit(&mut self, _handle: StackHandle) {}
}

// ----------------------------------------------------------------------------
// System Control
// ----------------------------------------------------------------------------

/// Process-level control
pub trait SystemControl: Send {
    /// Restart unconditionally; never returns
    fn reboot(&self) -> !;
}

/// Restarts by re-executing the current binary with the same arguments
///
/// Aborts the process if the restart cannot be performed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRestart;

impl SystemControl for ProcessRestart {
    fn reboot(&self) -> ! {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;

            match std::env::current_exe() {
                Ok(exe) => {
                    info!("Re-executing {}", exe.display());
                    let err = std::process::Command::new(exe)
                        .args(std::env::args_os().skip(1))
                        .exec();
                    error!("Restart failed: {}", err);
                }
                Err(e) => error!("Cannot resolve current executable: {}", e),
            }
        }

        std::process::abort()
    }
}
