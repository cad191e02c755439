//! In-memory optional subsystems
//!
//! Every type here is cheaply cloneable and clones share state, so a test can
//! hand one clone to the runtime and inspect another.

use std::sync::{Arc, Mutex, MutexGuard};

use sidewalk_core::{
    FileTransferSession, FirmwareStaging, LinkMask, LinkMaskStore, MfgStore, SidError, SidResult,
    StackHandle, SystemControl,
};
use tracing::{debug, info};

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ----------------------------------------------------------------------------
// Link Mask Settings
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SettingsState {
    mask: Option<LinkMask>,
    fail_load: bool,
    fail_store: bool,
    writes: Vec<LinkMask>,
}

/// Link mask store backed by memory
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    state: Arc<Mutex<SettingsState>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `mask`
    pub fn with_mask(mask: LinkMask) -> Self {
        let settings = Self::default();
        lock(&settings.state).mask = Some(mask);
        settings
    }

    pub fn stored(&self) -> Option<LinkMask> {
        lock(&self.state).mask
    }

    /// Every mask written, in order
    pub fn writes(&self) -> Vec<LinkMask> {
        lock(&self.state).writes.clone()
    }

    pub fn fail_load(&self, fail: bool) {
        lock(&self.state).fail_load = fail;
    }

    pub fn fail_store(&self, fail: bool) {
        lock(&self.state).fail_store = fail;
    }
}

impl LinkMaskStore for MemorySettings {
    fn load_link_mask(&self) -> SidResult<Option<LinkMask>> {
        let state = lock(&self.state);
        if state.fail_load {
            return Err(SidError::generic("settings read failed"));
        }
        Ok(state.mask)
    }

    fn store_link_mask(&mut self, mask: LinkMask) -> SidResult<()> {
        let mut state = lock(&self.state);
        state.writes.push(mask);
        if state.fail_store {
            return Err(SidError::generic("settings write failed"));
        }
        state.mask = Some(mask);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Firmware Staging
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FirmwareState {
    image: Vec<u8>,
    capacity: Option<usize>,
    writes: Vec<(u32, usize)>,
    cancels: usize,
    confirms: usize,
    fail_confirm: bool,
}

/// Firmware staging area backed by a growable buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryFirmware {
    state: Arc<Mutex<FirmwareState>>,
}

impl MemoryFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Staging area that rejects writes ending past `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        let firmware = Self::default();
        lock(&firmware.state).capacity = Some(capacity);
        firmware
    }

    pub fn image(&self) -> Vec<u8> {
        lock(&self.state).image.clone()
    }

    /// `(offset, length)` of every accepted write
    pub fn writes(&self) -> Vec<(u32, usize)> {
        lock(&self.state).writes.clone()
    }

    pub fn cancels(&self) -> usize {
        lock(&self.state).cancels
    }

    pub fn confirms(&self) -> usize {
        lock(&self.state).confirms
    }

    pub fn fail_confirm(&self, fail: bool) {
        lock(&self.state).fail_confirm = fail;
    }
}

impl FirmwareStaging for MemoryFirmware {
    fn write(&mut self, offset: u32, data: &[u8]) -> SidResult<()> {
        let mut state = lock(&self.state);
        let start = usize::try_from(offset).map_err(|_| SidError::InvalidArgs)?;
        let end = start + data.len();

        if state.capacity.is_some_and(|capacity| end > capacity) {
            return Err(SidError::OutOfResources);
        }
        if state.image.len() < end {
            state.image.resize(end, 0xFF);
        }
        state.image[start..end].copy_from_slice(data);
        state.writes.push((offset, data.len()));
        Ok(())
    }

    fn cancel(&mut self) -> SidResult<()> {
        let mut state = lock(&self.state);
        state.cancels += 1;
        state.image.clear();
        Ok(())
    }

    fn confirm_image(&mut self) -> SidResult<()> {
        let mut state = lock(&self.state);
        if state.fail_confirm {
            return Err(SidError::generic("image confirm failed"));
        }
        state.confirms += 1;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File Transfer Session
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransferCall {
    Init(StackHandle),
    Deinit(StackHandle),
}

/// File-transfer session that records init/deinit pairs
#[derive(Debug, Clone, Default)]
pub struct RecordingFileTransfer {
    calls: Arc<Mutex<Vec<FileTransferCall>>>,
}

impl RecordingFileTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<FileTransferCall> {
        lock(&self.calls).clone()
    }
}

impl FileTransferSession for RecordingFileTransfer {
    fn init(&mut self, handle: StackHandle) {
        debug!("File transfer session up on {}", handle);
        lock(&self.calls).push(FileTransferCall::Init(handle));
    }

    fn deinit(&mut self, handle: StackHandle) {
        debug!("File transfer session down on {}", handle);
        lock(&self.calls).push(FileTransferCall::Deinit(handle));
    }
}

// ----------------------------------------------------------------------------
// Manufacturing Store
// ----------------------------------------------------------------------------

/// Manufacturing store with a fixed validation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticMfgStore {
    valid: bool,
}

impl StaticMfgStore {
    pub fn valid() -> Self {
        Self { valid: true }
    }

    pub fn mismatched() -> Self {
        Self { valid: false }
    }
}

impl MfgStore for StaticMfgStore {
    fn validate(&self) -> SidResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(SidError::generic("mfg version mismatch"))
        }
    }
}

// ----------------------------------------------------------------------------
// System Control
// ----------------------------------------------------------------------------

/// Turns a reboot into a panic, so tests can observe it
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicOnReboot;

impl SystemControl for PanicOnReboot {
    fn reboot(&self) -> ! {
        info!("Reboot requested in test harness");
        panic!("reboot requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_writes_land_at_offset() {
        let mut firmware = MemoryFirmware::new();
        firmware.write(4, &[1, 2]).unwrap();
        firmware.write(0, &[9]).unwrap();

        assert_eq!(firmware.image(), vec![9, 0xFF, 0xFF, 0xFF, 1, 2]);
        assert_eq!(firmware.writes(), vec![(4, 2), (0, 1)]);
    }

    #[test]
    fn firmware_capacity_is_enforced() {
        let mut firmware = MemoryFirmware::with_capacity(4);
        assert_eq!(firmware.write(2, &[0; 3]), Err(SidError::OutOfResources));
        assert!(firmware.writes().is_empty());
    }

    #[test]
    fn settings_clones_share_state() {
        let settings = MemorySettings::new();
        let mut handed_out = settings.clone();

        handed_out.store_link_mask(LinkMask::FSK).unwrap();
        assert_eq!(settings.stored(), Some(LinkMask::FSK));
    }
}
