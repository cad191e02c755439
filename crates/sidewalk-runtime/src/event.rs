//! Runtime events and the queue that carries them
//!
//! Every producer (application code, stack notifications, transport
//! callbacks) talks to the dispatcher by posting a [`SidewalkEvent`].

use core::fmt;

use sidewalk_core::{OutboundMessage, SidStatus, TransferChunk};

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Events consumed by the event dispatcher, one at a time
///
/// Payload-carrying variants hold an `Option` so that producers relaying a
/// missing payload are reported by the dispatcher instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidewalkEvent {
    /// Drain pending stack work
    Process,
    PlatformInit,
    Autostart,
    FactoryReset,
    NewStatus(Option<SidStatus>),
    SendMessage(Option<OutboundMessage>),
    /// Request a BLE connection
    Connect,
    LinkSwitch,
    FileTransfer(Option<TransferChunk>),
    Exit,
    Reboot,
}

impl SidewalkEvent {
    pub fn send(message: OutboundMessage) -> Self {
        SidewalkEvent::SendMessage(Some(message))
    }

    pub fn status(status: SidStatus) -> Self {
        SidewalkEvent::NewStatus(Some(status))
    }

    pub fn chunk(chunk: TransferChunk) -> Self {
        SidewalkEvent::FileTransfer(Some(chunk))
    }

    /// Short name used in log output
    pub fn name(&self) -> &'static str {
        match self {
            SidewalkEvent::Process => "process",
            SidewalkEvent::PlatformInit => "platform-init",
            SidewalkEvent::Autostart => "autostart",
            SidewalkEvent::FactoryReset => "factory-reset",
            SidewalkEvent::NewStatus(_) => "new-status",
            SidewalkEvent::SendMessage(_) => "send-message",
            SidewalkEvent::Connect => "connect",
            SidewalkEvent::LinkSwitch => "link-switch",
            SidewalkEvent::FileTransfer(_) => "file-transfer",
            SidewalkEvent::Exit => "exit",
            SidewalkEvent::Reboot => "reboot",
        }
    }
}

impl fmt::Display for SidewalkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Event Queue
// ----------------------------------------------------------------------------

pub type EventSender = tokio::sync::mpsc::Sender<SidewalkEvent>;
pub type EventReceiver = tokio::sync::mpsc::Receiver<SidewalkEvent>;
/// Sender that does not keep the queue open on its own
pub type WeakEventSender = tokio::sync::mpsc::WeakSender<SidewalkEvent>;

/// Create the bounded event queue (producers -> event task)
pub fn create_event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::channel(capacity)
}
