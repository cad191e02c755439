//! Runtime Builder API
//!
//! Wires the event queue, the pending-message registry and the collaborators
//! together, spawns the event task and hands back a [`RuntimeHandle`].
//!
//! The queue and registry exist before the stack does, so the stack can be
//! constructed with the [`StackEvents`] bridge returned by
//! [`RuntimeBuilder::stack_events`].

use std::sync::Arc;

use sidewalk_core::{
    DeviceConfig, FileTransferSession, FirmwareStaging, LinkMaskStore, MfgStore, PendingMessages,
    SidError, SidResult, SidewalkStack, SystemControl,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::info;

use crate::dispatcher::{Collaborators, EventDispatcher};
use crate::event::{create_event_channel, EventReceiver, EventSender, SidewalkEvent};
use crate::notifier::StackEvents;
use crate::task::EventTask;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for the end-device runtime
pub struct RuntimeBuilder {
    config: DeviceConfig,
    sender: EventSender,
    receiver: EventReceiver,
    registry: Arc<PendingMessages>,
    stack: Option<Box<dyn SidewalkStack>>,
    link_mask_store: Option<Box<dyn LinkMaskStore>>,
    mfg: Option<Box<dyn MfgStore>>,
    firmware: Option<Box<dyn FirmwareStaging>>,
    file_transfer: Option<Box<dyn FileTransferSession>>,
    system: Option<Box<dyn SystemControl>>,
}

impl RuntimeBuilder {
    pub fn new(config: DeviceConfig) -> Self {
        // A zero capacity is rejected when building; the channel itself needs at least one slot.
        let (sender, receiver) = create_event_channel(config.event_queue_size.max(1));
        Self {
            config,
            sender,
            receiver,
            registry: Arc::new(PendingMessages::new()),
            stack: None,
            link_mask_store: None,
            mfg: None,
            firmware: None,
            file_transfer: None,
            system: None,
        }
    }

    /// Notification bridge to hand to the stack implementation
    pub fn stack_events(&self) -> StackEvents {
        StackEvents::new(&self.sender, self.registry.clone())
    }

    pub fn registry(&self) -> Arc<PendingMessages> {
        self.registry.clone()
    }

    pub fn with_stack(mut self, stack: Box<dyn SidewalkStack>) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn with_link_mask_store(mut self, store: Box<dyn LinkMaskStore>) -> Self {
        self.link_mask_store = Some(store);
        self
    }

    pub fn with_mfg_store(mut self, mfg: Box<dyn MfgStore>) -> Self {
        self.mfg = Some(mfg);
        self
    }

    pub fn with_firmware(mut self, firmware: Box<dyn FirmwareStaging>) -> Self {
        self.firmware = Some(firmware);
        self
    }

    pub fn with_file_transfer(mut self, session: Box<dyn FileTransferSession>) -> Self {
        self.file_transfer = Some(session);
        self
    }

    pub fn with_system_control(mut self, system: Box<dyn SystemControl>) -> Self {
        self.system = Some(system);
        self
    }

    /// Build the event task without spawning it
    pub fn build(self) -> SidResult<(EventTask, RuntimeHandle)> {
        self.config.validate()?;
        let stack = self
            .stack
            .ok_or_else(|| SidError::config_error("no protocol stack configured"))?;

        let mut collaborators = Collaborators::new(stack);
        if let Some(store) = self.link_mask_store {
            collaborators = collaborators.with_link_mask_store(store);
        }
        if let Some(mfg) = self.mfg {
            collaborators = collaborators.with_mfg_store(mfg);
        }
        if let Some(firmware) = self.firmware {
            collaborators = collaborators.with_firmware(firmware);
        }
        if let Some(session) = self.file_transfer {
            collaborators = collaborators.with_file_transfer(session);
        }
        if let Some(system) = self.system {
            collaborators = collaborators.with_system_control(system);
        }

        let dispatcher = EventDispatcher::new(self.config, self.registry.clone(), collaborators);
        let task = EventTask::new(dispatcher, self.receiver);
        let handle = RuntimeHandle {
            sender: self.sender,
            registry: self.registry,
            task: None,
        };
        Ok((task, handle))
    }

    /// Build the runtime and spawn its event task
    pub async fn build_and_start(self) -> SidResult<RuntimeHandle> {
        info!("Building Sidewalk end-device runtime");

        let (task, mut handle) = self.build()?;
        handle.task = Some(tokio::spawn(task.run()));

        info!("Sidewalk runtime started");
        Ok(handle)
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Producer-side handle to a running runtime
pub struct RuntimeHandle {
    sender: EventSender,
    registry: Arc<PendingMessages>,
    task: Option<JoinHandle<EventDispatcher>>,
}

impl RuntimeHandle {
    /// Post an event, waiting for queue capacity
    pub async fn post(&self, event: SidewalkEvent) -> SidResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| SidError::channel_error("Event task is no longer running"))
    }

    /// Post an event without waiting; for contexts that must not block
    pub fn try_post(&self, event: SidewalkEvent) -> SidResult<()> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => {
                SidError::channel_error(format!("Event queue full, dropped {}", event))
            }
            TrySendError::Closed(_) => SidError::channel_error("Event task is no longer running"),
        })
    }

    /// A clone of the queue's sending side
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn registry(&self) -> Arc<PendingMessages> {
        self.registry.clone()
    }

    /// A fresh notification bridge bound to this runtime
    pub fn notifier(&self) -> StackEvents {
        StackEvents::new(&self.sender, self.registry.clone())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Post exit and wait for the event task to finish
    ///
    /// Returns the dispatcher so callers can inspect the final context.
    pub async fn shutdown(mut self) -> SidResult<EventDispatcher> {
        let task = self
            .task
            .take()
            .ok_or_else(|| SidError::channel_error("Runtime was never started"))?;

        // The task may already have exited on its own; joining still succeeds.
        let _ = self.sender.send(SidewalkEvent::Exit).await;

        task.await
            .map_err(|e| SidError::channel_error(format!("Event task panicked: {}", e)))
    }
}
