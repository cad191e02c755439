//! Sidewalk End-Device Core
//!
//! This crate provides the foundational pieces of the device-side control plane:
//!
//! - [`errors`] - The error taxonomy shared by the runtime and the transport adapter
//! - [`types`] - Link masks, message descriptors, status snapshots and transfer chunks
//! - [`registry`] - The lock-guarded registry of in-flight outbound messages
//! - [`config`] - Device configuration (link selection, auto-connect, file transfer)
//! - [`stack`] - The interface of the underlying protocol stack
//! - [`capabilities`] - Optional subsystems (settings, firmware staging, file transfer)
//!
//! The runtime engine lives in `sidewalk-runtime`; this crate only defines the
//! stable types and the seams the engine is plugged into.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod capabilities;
pub mod config;
pub mod errors;
pub mod registry;
pub mod stack;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use capabilities::{
    FileTransferSession, FirmwareStaging, LinkMaskStore, MfgStore, NoFileTransfer, NoFirmware,
    NoLinkMaskStore, ProcessRestart, SystemControl, ValidMfgStore,
};
pub use config::{AutoConnectConfig, DeviceConfig, FileTransferConfig, FlashRegion};
pub use errors::{SidError, SidResult};
pub use registry::{LockMode, PendingMessages};
pub use stack::{PlatformParameters, SidewalkStack, StackCallbacks};
pub use types::{
    AutoConnectParams, ConnectionPolicy, LinkMask, LinkType, MessageDescriptor, MessageId,
    MessageType, OutboundMessage, PendingMessage, RejectReason, SidState, SidStatus, StackConfig,
    StackHandle, StackOption, TransferChunk,
};
