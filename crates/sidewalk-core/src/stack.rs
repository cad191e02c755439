//! Interface of the underlying Sidewalk protocol stack
//!
//! The stack itself (framing, retransmission, radio access) is an external
//! collaborator. The runtime only drives it through [`SidewalkStack`] and
//! receives its notifications through [`StackCallbacks`].

use crate::config::FlashRegion;
use crate::errors::{SidError, SidResult};
use crate::types::{
    LinkMask, MessageDescriptor, MessageId, RejectReason, SidStatus, StackConfig, StackHandle,
    StackOption, TransferChunk,
};

// ----------------------------------------------------------------------------
// Platform Parameters
// ----------------------------------------------------------------------------

/// Parameters for the one-time platform initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformParameters {
    pub mfg_region: FlashRegion,
}

// ----------------------------------------------------------------------------
// Stack Operations
// ----------------------------------------------------------------------------

/// Operations consumed from the protocol stack
///
/// Every call is made from the single event-processing task.
pub trait SidewalkStack: Send {
    /// Initialize platform resources
    fn platform_init(&mut self, params: &PlatformParameters) -> SidResult<()>;

    /// Create a stack instance for the given configuration
    fn init(&mut self, config: &StackConfig) -> SidResult<StackHandle>;

    /// Start the instance on the given links
    fn start(&mut self, handle: StackHandle, link_mask: LinkMask) -> SidResult<()>;

    /// Stop the given links without tearing down the instance
    fn stop(&mut self, handle: StackHandle, link_mask: LinkMask) -> SidResult<()>;

    /// Tear down the instance; the handle is invalid afterwards
    fn deinit(&mut self, handle: StackHandle) -> SidResult<()>;

    /// Drain pending stack work
    fn process(&mut self, handle: StackHandle) -> SidResult<()>;

    /// Queue a message; on success the stack writes the assigned id into `desc`
    ///
    /// The caller records the message as pending only after this returns, so
    /// the delivery notification for it must not fire from inside this call.
    /// An acknowledgment that overtakes the record finds nothing to release,
    /// and the entry then stays pending until exit.
    fn put_msg(
        &mut self,
        handle: StackHandle,
        payload: &[u8],
        desc: &mut MessageDescriptor,
    ) -> SidResult<()>;

    fn set_option(&mut self, handle: StackHandle, option: &StackOption) -> SidResult<()>;

    fn set_factory_reset(&mut self, handle: StackHandle) -> SidResult<()>;

    /// Ask the BLE link to connect (or stop trying)
    fn ble_connection_request(&mut self, handle: StackHandle, enable: bool) -> SidResult<()>;

    fn bulk_transfer_cancel(
        &mut self,
        handle: StackHandle,
        file_id: u32,
        reason: RejectReason,
    ) -> SidResult<()>;

    /// Give a transfer buffer back to the stack
    fn bulk_transfer_release_buffer(
        &mut self,
        handle: StackHandle,
        file_id: u32,
        buffer: Vec<u8>,
    ) -> SidResult<()>;
}

// ----------------------------------------------------------------------------
// Stack Notifications
// ----------------------------------------------------------------------------

/// Notifications delivered by the stack from its own execution context
///
/// Implementations must not block: the caller may be an interrupt-like context.
pub trait StackCallbacks: Send + Sync {
    /// The stack has work to do and wants `process` to be called
    fn on_event_pending(&self);

    fn on_status_changed(&self, status: SidStatus);

    /// A previously submitted message was delivered
    fn on_msg_sent(&self, id: MessageId);

    /// A previously submitted message could not be delivered
    fn on_send_error(&self, id: MessageId, error: SidError);

    fn on_msg_received(&self, desc: &MessageDescriptor, data: &[u8]);

    fn on_factory_reset(&self);

    /// A file-transfer chunk arrived
    ///
    /// `Ok` means the runtime took the chunk and will hand its buffer back
    /// through [`SidewalkStack::bulk_transfer_release_buffer`]. A chunk that
    /// could not be accepted is returned, and the stack releases it itself.
    fn on_transfer_chunk(&self, chunk: TransferChunk) -> Result<(), TransferChunk>;
}
