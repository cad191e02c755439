//! Sidewalk Test Harness
//!
//! Deterministic in-memory implementations of every collaborator the runtime
//! drives. Each fake hands out a cloneable probe or is itself cloneable, so a
//! test can keep observing (and steering) a collaborator after moving it into
//! the runtime.
//!
//! - [`RecordingStack`] / [`StackProbe`]: protocol stack that records calls
//! - [`MemorySettings`], [`MemoryFirmware`], [`RecordingFileTransfer`],
//!   [`StaticMfgStore`], [`PanicOnReboot`]: optional subsystems
//! - [`FakeBleHost`]: radio host behind the BLE adapter

pub mod ble_host;
pub mod stack;
pub mod storage;

pub use ble_host::{FakeBleHost, HostOp};
pub use stack::{RecordingStack, StackCall, StackOp, StackProbe};
pub use storage::{
    FileTransferCall, MemoryFirmware, MemorySettings, PanicOnReboot, RecordingFileTransfer,
    StaticMfgStore,
};
