//! Bridge from stack notifications to the runtime
//!
//! Stack callbacks run on the stack's own context. They never touch the
//! device context directly: work is posted as events, and delivery
//! acknowledgments reclaim registry entries without blocking.
//!
//! The bridge only holds a weak reference to the event queue. The stack it
//! lives in is owned by the event task, so a strong sender would keep the
//! queue open after every producer-side handle is gone.

use std::sync::Arc;

use sidewalk_core::{
    LockMode, MessageDescriptor, MessageId, PendingMessages, SidError, SidStatus, StackCallbacks,
    TransferChunk,
};
use tracing::{debug, error, info, warn};

use crate::event::{EventSender, SidewalkEvent, WeakEventSender};

/// [`StackCallbacks`] implementation feeding the event queue
#[derive(Clone)]
pub struct StackEvents {
    sender: WeakEventSender,
    registry: Arc<PendingMessages>,
}

impl StackEvents {
    pub fn new(sender: &EventSender, registry: Arc<PendingMessages>) -> Self {
        Self {
            sender: sender.downgrade(),
            registry,
        }
    }

    /// Queue an event without blocking; the event comes back if it was not queued
    fn post(&self, event: SidewalkEvent) -> Result<(), SidewalkEvent> {
        let Some(sender) = self.sender.upgrade() else {
            warn!("Runtime is gone, dropping {} event from stack", event.name());
            return Err(event);
        };

        let name = event.name();
        sender.try_send(event).map_err(|e| {
            error!("Failed to queue {} event from stack: {}", name, e);
            e.into_inner()
        })
    }

    /// Queue a notification that carries nothing the stack has to reclaim
    fn notify(&self, event: SidewalkEvent) {
        let _ = self.post(event);
    }

    /// Reclaim the registry entry of an acknowledged message
    fn release(&self, id: MessageId) {
        match self.registry.take_by_id(id, LockMode::NonBlocking) {
            Ok(message) => debug!("Released message {} ({} bytes)", id, message.size()),
            Err(SidError::NotFound) => warn!("Acknowledged message {} is not pending", id),
            Err(e) => error!("Failed to release message {}: {}", id, e),
        }
    }
}

impl StackCallbacks for StackEvents {
    fn on_event_pending(&self) {
        self.notify(SidewalkEvent::Process);
    }

    fn on_status_changed(&self, status: SidStatus) {
        self.notify(SidewalkEvent::status(status));
    }

    fn on_msg_sent(&self, id: MessageId) {
        info!("Message {} sent", id);
        self.release(id);
    }

    fn on_send_error(&self, id: MessageId, error: SidError) {
        error!("Message {} send failed: {}", id, error);
        self.release(id);
    }

    fn on_msg_received(&self, desc: &MessageDescriptor, data: &[u8]) {
        info!(
            "Received message (type: {:?}, id: {}, size: {})",
            desc.msg_type,
            desc.id,
            data.len()
        );
    }

    fn on_factory_reset(&self) {
        info!("Factory reset notification received from sid stack");
        self.notify(SidewalkEvent::Reboot);
    }

    fn on_transfer_chunk(&self, chunk: TransferChunk) -> Result<(), TransferChunk> {
        match self.post(SidewalkEvent::chunk(chunk)) {
            Ok(()) => Ok(()),
            Err(SidewalkEvent::FileTransfer(Some(chunk))) => {
                warn!("Handing buffer of file {} back to the stack", chunk.file_id);
                Err(chunk)
            }
            // `post` only ever returns the event it was given.
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::create_event_channel;
    use sidewalk_core::{MessageType, OutboundMessage, PendingMessage};

    fn registry_with(id: MessageId) -> Arc<PendingMessages> {
        let mut message = OutboundMessage::new(MessageType::Notify, b"data".to_vec());
        message.desc.id = id;
        let registry = Arc::new(PendingMessages::new());
        registry
            .insert(PendingMessage::duplicate(&message).unwrap())
            .unwrap();
        registry
    }

    #[test]
    fn acknowledgment_releases_entry() {
        let (sender, _receiver) = create_event_channel(4);
        let registry = registry_with(3);
        let events = StackEvents::new(&sender, registry.clone());

        events.on_msg_sent(3);
        assert!(registry.is_empty());

        // A second acknowledgment for the same id is harmless.
        events.on_msg_sent(3);
        assert!(registry.is_empty());
    }

    #[test]
    fn early_acknowledgment_leaves_entry_for_exit() {
        let (sender, _receiver) = create_event_channel(4);
        let registry = Arc::new(PendingMessages::new());
        let events = StackEvents::new(&sender, registry.clone());

        // Delivery reported before the dispatcher recorded the message.
        events.on_msg_sent(8);
        let mut message = OutboundMessage::new(MessageType::Notify, b"late".to_vec());
        message.desc.id = 8;
        registry
            .insert(PendingMessage::duplicate(&message).unwrap())
            .unwrap();

        assert_eq!(registry.ids(), vec![8]);
        assert_eq!(registry.drain_all().len(), 1);
    }

    #[test]
    fn send_error_releases_entry() {
        let (sender, _receiver) = create_event_channel(4);
        let registry = registry_with(11);
        let events = StackEvents::new(&sender, registry.clone());

        events.on_send_error(11, SidError::Stack { code: -5 });
        assert!(registry.is_empty());
    }

    #[test]
    fn notifications_become_events() {
        let (sender, mut receiver) = create_event_channel(8);
        let events = StackEvents::new(&sender, Arc::new(PendingMessages::new()));

        events.on_event_pending();
        events.on_status_changed(SidStatus::default());
        events.on_factory_reset();
        assert_eq!(events.on_transfer_chunk(TransferChunk::new(1, 0, vec![0xAA])), Ok(()));

        assert_eq!(receiver.try_recv().unwrap(), SidewalkEvent::Process);
        assert_eq!(
            receiver.try_recv().unwrap(),
            SidewalkEvent::status(SidStatus::default())
        );
        assert_eq!(receiver.try_recv().unwrap(), SidewalkEvent::Reboot);
        assert_eq!(
            receiver.try_recv().unwrap(),
            SidewalkEvent::chunk(TransferChunk::new(1, 0, vec![0xAA]))
        );
    }

    #[test]
    fn chunk_is_handed_back_when_queue_is_full() {
        let (sender, mut receiver) = create_event_channel(1);
        let events = StackEvents::new(&sender, Arc::new(PendingMessages::new()));

        events.on_event_pending();
        let returned = events.on_transfer_chunk(TransferChunk::new(5, 0, vec![1; 8]));

        assert_eq!(returned, Err(TransferChunk::new(5, 0, vec![1; 8])));
        assert_eq!(receiver.try_recv().unwrap(), SidewalkEvent::Process);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn chunk_is_handed_back_once_runtime_is_gone() {
        let (sender, receiver) = create_event_channel(4);
        let events = StackEvents::new(&sender, Arc::new(PendingMessages::new()));
        drop(sender);
        drop(receiver);

        let returned = events.on_transfer_chunk(TransferChunk::new(2, 16, vec![0x55; 4]));
        assert_eq!(returned.unwrap_err().into_buffer(), vec![0x55; 4]);
    }

    #[test]
    fn bridge_does_not_keep_the_queue_open() {
        let (sender, mut receiver) = create_event_channel(4);
        let events = StackEvents::new(&sender, Arc::new(PendingMessages::new()));

        drop(sender);
        events.on_event_pending();

        assert!(matches!(
            receiver.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn full_queue_drops_notification() {
        let (sender, mut receiver) = create_event_channel(1);
        let events = StackEvents::new(&sender, Arc::new(PendingMessages::new()));

        events.on_event_pending();
        events.on_event_pending();

        assert_eq!(receiver.try_recv().unwrap(), SidewalkEvent::Process);
        assert!(receiver.try_recv().is_err());
    }
}
