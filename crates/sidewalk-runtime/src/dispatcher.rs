//! Event Dispatcher
//!
//! Applies one [`SidewalkEvent`] at a time to the [`DeviceContext`] and the
//! protocol stack. A failing stack call inside a handler is logged and the
//! handler carries on (or returns) without taking the runtime down; only
//! malformed or unsupported requests are reported back as errors.

use std::io::Write;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use sidewalk_core::{
    ConnectionPolicy, DeviceConfig, FileTransferSession, FirmwareStaging, LinkMask, LinkMaskStore,
    LinkType, MfgStore, NoFileTransfer, NoFirmware, NoLinkMaskStore, OutboundMessage,
    PendingMessage, PendingMessages, PlatformParameters, ProcessRestart, RejectReason, SidError,
    SidResult, SidStatus, SidewalkStack, StackHandle, StackOption, SystemControl, TransferChunk,
    ValidMfgStore,
};
use tracing::{debug, error, info, warn};

use crate::context::{DeviceContext, RuntimeState};
use crate::event::SidewalkEvent;

// ----------------------------------------------------------------------------
// Collaborators
// ----------------------------------------------------------------------------

/// External collaborators driven by the dispatcher
pub struct Collaborators {
    pub stack: Box<dyn SidewalkStack>,
    pub link_mask_store: Box<dyn LinkMaskStore>,
    pub mfg: Box<dyn MfgStore>,
    pub firmware: Box<dyn FirmwareStaging>,
    pub file_transfer: Box<dyn FileTransferSession>,
    pub system: Box<dyn SystemControl>,
}

impl Collaborators {
    /// Collaborators with every optional subsystem disabled
    pub fn new(stack: Box<dyn SidewalkStack>) -> Self {
        Self {
            stack,
            link_mask_store: Box::new(NoLinkMaskStore),
            mfg: Box::new(ValidMfgStore),
            firmware: Box::new(NoFirmware),
            file_transfer: Box::new(NoFileTransfer),
            system: Box::new(ProcessRestart),
        }
    }

    pub fn with_link_mask_store(mut self, store: Box<dyn LinkMaskStore>) -> Self {
        self.link_mask_store = store;
        self
    }

    pub fn with_mfg_store(mut self, mfg: Box<dyn MfgStore>) -> Self {
        self.mfg = mfg;
        self
    }

    pub fn with_firmware(mut self, firmware: Box<dyn FirmwareStaging>) -> Self {
        self.firmware = firmware;
        self
    }

    pub fn with_file_transfer(mut self, session: Box<dyn FileTransferSession>) -> Self {
        self.file_transfer = session;
        self
    }

    pub fn with_system_control(mut self, system: Box<dyn SystemControl>) -> Self {
        self.system = system;
        self
    }
}

// ----------------------------------------------------------------------------
// Dispatch Outcome
// ----------------------------------------------------------------------------

/// What the event task should do after an event was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The runtime was torn down; `released` pending messages were freed
    Exited { released: usize },
}

// ----------------------------------------------------------------------------
// Event Dispatcher
// ----------------------------------------------------------------------------

/// Single-consumer state machine over the device runtime context
pub struct EventDispatcher {
    context: DeviceContext,
    config: DeviceConfig,
    registry: Arc<PendingMessages>,
    collaborators: Collaborators,
}

impl EventDispatcher {
    pub fn new(
        config: DeviceConfig,
        registry: Arc<PendingMessages>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            context: DeviceContext::new(config.link_mask),
            config,
            registry,
            collaborators,
        }
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn registry(&self) -> &Arc<PendingMessages> {
        &self.registry
    }

    /// Apply a single event
    pub fn dispatch(&mut self, event: SidewalkEvent) -> SidResult<Flow> {
        let outcome = match event {
            SidewalkEvent::Process => self.process(),
            SidewalkEvent::PlatformInit => self.platform_init(),
            SidewalkEvent::Autostart => self.autostart(),
            SidewalkEvent::FactoryReset => self.factory_reset(),
            SidewalkEvent::NewStatus(status) => self.new_status(status),
            SidewalkEvent::SendMessage(message) => self.send_message(message),
            SidewalkEvent::Connect => self.connect(),
            SidewalkEvent::LinkSwitch => self.link_switch(),
            SidewalkEvent::FileTransfer(chunk) => self.file_transfer(chunk),
            SidewalkEvent::Exit => return Ok(self.exit()),
            SidewalkEvent::Reboot => self.reboot(),
        };
        outcome.map(|()| Flow::Continue)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    fn process(&mut self) -> SidResult<()> {
        match self.context.handle {
            Some(handle) => {
                if let Err(e) = self.collaborators.stack.process(handle) {
                    error!("sid process err {}", e);
                }
            }
            None => debug!("Process requested without a stack instance"),
        }
        Ok(())
    }

    fn platform_init(&mut self) -> SidResult<()> {
        let region = self.config.mfg_region;
        let params = PlatformParameters { mfg_region: region };

        if let Err(e) = self.collaborators.stack.platform_init(&params) {
            error!("Sidewalk Platform Init err: {}", e);
            return Ok(());
        }

        if let Err(e) = self.collaborators.mfg.validate() {
            error!("The mfg.hex version mismatch ({})", e);
            error!("Check if the file has been generated and flashed properly");
            error!("START ADDRESS: {:#010x}", region.start);
            error!("SIZE: {:#010x}", region.size);
            return Ok(());
        }

        self.context.state = RuntimeState::PlatformReady;
        info!("Sidewalk platform initialized");
        Ok(())
    }

    fn autostart(&mut self) -> SidResult<()> {
        if let Some(handle) = self.context.handle {
            warn!("Sidewalk already started ({}), ignoring autostart", handle);
            return Ok(());
        }
        if self.context.state == RuntimeState::Uninitialized {
            warn!("Autostart before a successful platform init");
        }

        if self.config.persistent_link_mask {
            self.restore_link_mask();
        }
        self.context.config.link_mask = self.context.config.link_mask.or_default();
        let link_mask = self.context.link_mask();
        info!("Sidewalk link switch to {}", link_mask);

        let handle = match self.collaborators.stack.init(&self.context.config) {
            Ok(handle) => handle,
            Err(e) => {
                error!("sid init err {}", e);
                return Ok(());
            }
        };
        self.context.handle = Some(handle);

        if let Err(e) = self.collaborators.stack.start(handle, link_mask) {
            error!("sid start err {}", e);
        }
        self.apply_auto_connect(handle);

        if self.config.file_transfer.dfu {
            if let Err(e) = self.collaborators.firmware.confirm_image() {
                error!("img confirm fail {}", e);
            }
        }
        if self.config.file_transfer.enabled {
            self.collaborators.file_transfer.init(handle);
        }

        self.context.state = RuntimeState::Started;
        Ok(())
    }

    fn restore_link_mask(&mut self) {
        match self.collaborators.link_mask_store.load_link_mask() {
            Ok(Some(mask)) => self.context.config.link_mask = mask,
            outcome => {
                match outcome {
                    Err(e) => warn!("Link mask get failed {}", e),
                    _ => warn!("Link mask not stored"),
                }
                self.context.config.link_mask = LinkMask::NONE;
                if let Err(e) = self
                    .collaborators
                    .link_mask_store
                    .store_link_mask(LinkMask::DEFAULT)
                {
                    warn!("Link mask set failed {}", e);
                }
            }
        }
    }

    fn apply_auto_connect(&mut self, handle: StackHandle) {
        if !self.config.auto_connect.enabled || !self.context.link_mask().contains(LinkType::Ble) {
            return;
        }

        let policy = StackOption::LinkConnectionPolicy(ConnectionPolicy::AutoConnect);
        if let Err(e) = self.collaborators.stack.set_option(handle, &policy) {
            error!("sid option multi link manager err {}", e);
        }

        let params = StackOption::LinkPolicyAutoConnectParams(self.config.auto_connect.params());
        if let Err(e) = self.collaborators.stack.set_option(handle, &params) {
            error!("sid option multi link policy err {}", e);
        }
    }

    fn factory_reset(&mut self) -> SidResult<()> {
        if self.config.persistent_link_mask {
            let _ = self
                .collaborators
                .link_mask_store
                .store_link_mask(LinkMask::NONE);
        }

        match self.context.handle {
            Some(handle) => {
                if let Err(e) = self.collaborators.stack.set_factory_reset(handle) {
                    error!("sid factory reset err {}", e);
                }
            }
            None => error!("sid factory reset err: no stack instance"),
        }
        Ok(())
    }

    fn new_status(&mut self, status: Option<SidStatus>) -> SidResult<()> {
        let Some(status) = status else {
            error!("sid new status is NULL");
            return Err(SidError::InvalidArgs);
        };

        debug!(
            "sid status: {:?}, registered {}, time synced {}, links up {:#x}",
            status.state,
            status.registered,
            status.time_synced,
            status.link_status_mask.bits()
        );
        self.context.last_status = Some(status);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------------

    fn send_message(&mut self, message: Option<OutboundMessage>) -> SidResult<()> {
        let Some(message) = message else {
            error!("sid send msg is NULL");
            return Err(SidError::InvalidArgs);
        };
        let Some(handle) = self.context.handle else {
            error!("sid send err: no stack instance");
            return Err(SidError::NullPointer);
        };

        let mut pending = PendingMessage::duplicate(&message).map_err(|e| {
            error!("Failed to allocate message buffer");
            e
        })?;

        let (payload, desc) = pending.submission_parts();
        if let Err(e) = self.collaborators.stack.put_msg(handle, payload, desc) {
            error!("sid send err {}", e);
            // `pending` goes out of scope here, releasing the duplicated buffer.
            return Err(e);
        }

        debug!(
            "sid send (type: {:?}, id: {})",
            pending.descriptor().msg_type,
            pending.id()
        );
        self.registry.insert(pending)
    }

    fn connect(&mut self) -> SidResult<()> {
        if !self.context.link_mask().contains(LinkType::Ble) {
            error!("Can not request connection - BLE not enabled");
            return Err(SidError::NoSupport);
        }
        let Some(handle) = self.context.handle else {
            error!("sid conn req err: no stack instance");
            return Err(SidError::NullPointer);
        };

        if let Err(e) = self.collaborators.stack.ble_connection_request(handle, true) {
            error!("sid conn req err {}", e);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Link Switch
    // ------------------------------------------------------------------------

    /// Move to the next link mask and rebuild the stack instance on it
    ///
    /// Every step is attempted even when an earlier one failed.
    fn link_switch(&mut self) -> SidResult<()> {
        self.context.state = RuntimeState::Switching;

        let new_mask = self.context.link_mask().next();
        self.context.config.link_mask = new_mask;
        info!("Sidewalk link switch to {}", new_mask);

        if self.config.persistent_link_mask {
            if let Err(e) = self.collaborators.link_mask_store.store_link_mask(new_mask) {
                error!("New link mask set err {}", e);
            }
        }

        if let Some(handle) = self.context.handle.take() {
            if self.config.file_transfer.enabled {
                self.collaborators.file_transfer.deinit(handle);
            }
            let _ = self.collaborators.stack.process(handle);
            if let Err(e) = self.collaborators.stack.deinit(handle) {
                error!("sid deinit err {}", e);
            }
        }

        match self.collaborators.stack.init(&self.context.config) {
            Ok(handle) => self.context.handle = Some(handle),
            Err(e) => error!("sid init err {}", e),
        }

        match self.context.handle {
            Some(handle) => {
                if self.config.file_transfer.enabled {
                    self.collaborators.file_transfer.init(handle);
                }
                if let Err(e) = self.collaborators.stack.start(handle, new_mask) {
                    error!("sid start err {}", e);
                }
                self.apply_auto_connect(handle);
            }
            None => error!("sid start err: no stack instance"),
        }

        self.context.state = RuntimeState::Started;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // File Transfer
    // ------------------------------------------------------------------------

    fn file_transfer(&mut self, chunk: Option<TransferChunk>) -> SidResult<()> {
        let Some(chunk) = chunk else {
            error!("File transfer event data is NULL");
            return Err(SidError::InvalidArgs);
        };

        if !self.config.file_transfer.enabled {
            warn!("File transfer not enabled, releasing file {}", chunk.file_id);
            let file_id = chunk.file_id;
            self.release_transfer_buffer(file_id, chunk.into_buffer());
            return Err(SidError::NoSupport);
        }

        info!(
            "Received file Id {}; buffer size {}; file offset {}",
            chunk.file_id,
            chunk.size(),
            chunk.file_offset
        );
        info!("SHA256: {}", chunk_digest(&chunk.data));

        let mut outcome = Ok(());
        if self.config.file_transfer.dfu {
            if let Err(e) = self
                .collaborators
                .firmware
                .write(chunk.file_offset, &chunk.data)
            {
                error!("Fail to write img {}", e);
                self.reject_transfer(chunk.file_id);
                outcome = Err(e);
            }
        }

        let file_id = chunk.file_id;
        self.release_transfer_buffer(file_id, chunk.into_buffer());
        outcome
    }

    fn reject_transfer(&mut self, file_id: u32) {
        if let Err(e) = self.collaborators.firmware.cancel() {
            error!("Fail to complete dfu {}", e);
        }

        match self.context.handle {
            Some(handle) => {
                if let Err(e) = self.collaborators.stack.bulk_transfer_cancel(
                    handle,
                    file_id,
                    RejectReason::FileTooBig,
                ) {
                    error!("sbdt cancel ret {}", e);
                }
            }
            None => error!("sbdt cancel: no stack instance for file {}", file_id),
        }
    }

    fn release_transfer_buffer(&mut self, file_id: u32, buffer: Vec<u8>) {
        match self.context.handle {
            Some(handle) => {
                if let Err(e) =
                    self.collaborators
                        .stack
                        .bulk_transfer_release_buffer(handle, file_id, buffer)
                {
                    error!("sbdt release ret {}", e);
                }
            }
            None => error!("sbdt release: no stack instance, dropping buffer of file {}", file_id),
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    fn exit(&mut self) -> Flow {
        if let Some(handle) = self.context.handle.take() {
            if self.config.file_transfer.enabled {
                self.collaborators.file_transfer.deinit(handle);
            }
            let _ = self.collaborators.stack.process(handle);
            let _ = self.collaborators.stack.deinit(handle);
        }

        let released = self.registry.drain_all().len();
        self.context.state = RuntimeState::Exited;
        info!("Sidewalk exited, released {} pending messages", released);

        Flow::Exited { released }
    }

    fn reboot(&self) -> ! {
        info!("Rebooting...");
        let _ = std::io::stdout().flush();
        self.collaborators.system.reboot()
    }
}

/// Upper-case hex SHA-256 of a transfer chunk, for diagnostics
pub fn chunk_digest(data: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(data))
}
