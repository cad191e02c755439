//! Domain types shared across the end-device runtime

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::errors::{SidError, SidResult};

// ----------------------------------------------------------------------------
// Link Selection
// ----------------------------------------------------------------------------

/// The three wireless link types a device can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Link A: short-range BLE
    Ble,
    /// Link B: narrow-band FSK
    Fsk,
    /// Link C: long-range LoRa
    Lora,
}

impl LinkType {
    /// Bit occupied by this link inside a [`LinkMask`]
    pub const fn bit(self) -> u32 {
        match self {
            LinkType::Ble => 1 << 0,
            LinkType::Fsk => 1 << 1,
            LinkType::Lora => 1 << 2,
        }
    }

    /// Human-readable link name used in log output
    pub const fn name(self) -> &'static str {
        match self {
            LinkType::Ble => "BLE",
            LinkType::Fsk => "FSK",
            LinkType::Lora => "LoRa",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitset selecting which links are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkMask(u32);

impl LinkMask {
    /// No link selected
    pub const NONE: LinkMask = LinkMask(0);
    /// Link A only
    pub const BLE: LinkMask = LinkMask(LinkType::Ble.bit());
    /// Link B only
    pub const FSK: LinkMask = LinkMask(LinkType::Fsk.bit());
    /// Link C only
    pub const LORA: LinkMask = LinkMask(LinkType::Lora.bit());
    /// Mask applied when nothing was configured or persisted
    pub const DEFAULT: LinkMask = LinkMask::BLE;

    /// Build a mask from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        LinkMask(bits)
    }

    /// Raw bits of the mask
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the given link is selected
    pub const fn contains(self, link: LinkType) -> bool {
        self.0 & link.bit() != 0
    }

    /// The mask itself, or [`LinkMask::DEFAULT`] when empty
    pub const fn or_default(self) -> Self {
        if self.is_empty() {
            LinkMask::DEFAULT
        } else {
            self
        }
    }

    /// Next mask in the fixed link-switch cycle: BLE -> FSK -> BLE|LoRa -> BLE
    ///
    /// Only the two exact masks `BLE` and `FSK` have a dedicated successor;
    /// everything else, including an empty mask, goes back to BLE.
    pub const fn next(self) -> Self {
        match self.0 {
            bits if bits == LinkMask::BLE.0 => LinkMask::FSK,
            bits if bits == LinkMask::FSK.0 => LinkMask(LinkMask::BLE.0 | LinkMask::LORA.0),
            _ => LinkMask::BLE,
        }
    }

    /// The link that dominates this mask when naming it: LoRa, then FSK, then BLE
    pub const fn primary(self) -> LinkType {
        if self.contains(LinkType::Lora) {
            LinkType::Lora
        } else if self.contains(LinkType::Fsk) {
            LinkType::Fsk
        } else {
            LinkType::Ble
        }
    }
}

impl BitOr for LinkMask {
    type Output = LinkMask;

    fn bitor(self, rhs: LinkMask) -> LinkMask {
        LinkMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for LinkMask {
    fn bitor_assign(&mut self, rhs: LinkMask) {
        self.0 |= rhs.0;
    }
}

impl From<LinkType> for LinkMask {
    fn from(link: LinkType) -> Self {
        LinkMask(link.bit())
    }
}

impl fmt::Display for LinkMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.primary().name())
    }
}

// ----------------------------------------------------------------------------
// Stack Handle and Configuration
// ----------------------------------------------------------------------------

/// Opaque, non-owning reference to a stack instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackHandle(u32);

impl StackHandle {
    pub const fn new(raw: u32) -> Self {
        StackHandle(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack#{}", self.0)
    }
}

/// Configuration handed to the stack on every init
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StackConfig {
    /// Links the stack is started on
    pub link_mask: LinkMask,
}

/// Connection policy for the multi-link manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    None,
    AutoConnect,
}

/// Parameters of the BLE auto-connect policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoConnectParams {
    pub link_type: LinkType,
    pub enable: bool,
    pub priority: u8,
    pub connection_attempt_timeout_secs: u16,
}

/// Options accepted by the stack's set-option call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOption {
    LinkConnectionPolicy(ConnectionPolicy),
    LinkPolicyAutoConnectParams(AutoConnectParams),
}

// ----------------------------------------------------------------------------
// Status Snapshot
// ----------------------------------------------------------------------------

/// Stack readiness as reported in status notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SidState {
    Ready,
    #[default]
    NotReady,
    Error,
    SecureChannelReady,
}

/// Last status observed from the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SidStatus {
    pub state: SidState,
    pub registered: bool,
    pub time_synced: bool,
    /// Links currently up
    pub link_status_mask: LinkMask,
}

// ----------------------------------------------------------------------------
// Messages
// ----------------------------------------------------------------------------

/// Message identifier assigned by the stack on submission
pub type MessageId = u16;

/// Message class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Get,
    Set,
    Notify,
    Response,
}

/// Metadata of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    /// Zero until the stack accepts the message
    pub id: MessageId,
    pub msg_type: MessageType,
}

impl MessageDescriptor {
    pub fn new(msg_type: MessageType) -> Self {
        Self { id: 0, msg_type }
    }
}

/// A caller-owned message submitted through the send-message event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub desc: MessageDescriptor,
    pub data: Vec<u8>,
}

impl OutboundMessage {
    pub fn new(msg_type: MessageType, data: impl Into<Vec<u8>>) -> Self {
        Self {
            desc: MessageDescriptor::new(msg_type),
            data: data.into(),
        }
    }
}

/// A message awaiting delivery confirmation
///
/// Owns a private copy of the caller's payload. Dropping it releases both the
/// payload buffer and the descriptor.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingMessage {
    desc: MessageDescriptor,
    payload: Box<[u8]>,
}

impl PendingMessage {
    /// Duplicate the caller's payload into a freshly allocated buffer
    ///
    /// Fails with [`SidError::OutOfResources`] if the buffer cannot be allocated.
    pub fn duplicate(message: &OutboundMessage) -> SidResult<Self> {
        let mut payload = Vec::new();
        payload
            .try_reserve_exact(message.data.len())
            .map_err(|_| SidError::OutOfResources)?;
        payload.extend_from_slice(&message.data);

        Ok(Self {
            desc: message.desc,
            payload: payload.into_boxed_slice(),
        })
    }

    pub fn id(&self) -> MessageId {
        self.desc.id
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.desc
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Payload and descriptor borrowed together, for submission to the stack
    pub fn submission_parts(&mut self) -> (&[u8], &mut MessageDescriptor) {
        (&self.payload, &mut self.desc)
    }

    pub fn into_parts(self) -> (MessageDescriptor, Box<[u8]>) {
        (self.desc, self.payload)
    }
}

// ----------------------------------------------------------------------------
// Bulk Data Transfer
// ----------------------------------------------------------------------------

/// Why a bulk transfer is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    Generic,
    FileTooBig,
    NoSpace,
    LowBattery,
}

/// One chunk of an incoming file transfer
///
/// The buffer belongs to the stack and must be released back to it once the
/// chunk has been consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferChunk {
    pub file_id: u32,
    pub file_offset: u32,
    pub data: Vec<u8>,
}

impl TransferChunk {
    pub fn new(file_id: u32, file_offset: u32, data: Vec<u8>) -> Self {
        Self {
            file_id,
            file_offset,
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.data
    }
}
