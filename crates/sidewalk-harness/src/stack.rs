//! Recording Protocol Stack
//!
//! A [`SidewalkStack`] that records every call, hands out sequential handles
//! and message ids, and can be told to fail any operation. Submitted messages
//! are acknowledged through the registered [`StackCallbacks`] on the next
//! `process` call unless auto-acknowledgment is turned off.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use sidewalk_ble::{BleAdapterInterface, BleCallbackSet, BleConfig};
use sidewalk_core::{
    LinkMask, LinkType, MessageDescriptor, MessageId, PlatformParameters, RejectReason, SidError,
    SidResult, SidewalkStack, StackCallbacks, StackConfig, StackHandle, StackOption,
};
use tracing::{debug, info};

/// Status code returned by operations told to fail
pub const INJECTED_FAILURE: i32 = -1;

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// Stack operations, used to select failures and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackOp {
    PlatformInit,
    Init,
    Start,
    Stop,
    Deinit,
    Process,
    PutMsg,
    SetOption,
    FactoryReset,
    ConnectionRequest,
    BulkCancel,
    ReleaseBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    PlatformInit,
    Init(LinkMask),
    Start(StackHandle, LinkMask),
    Stop(StackHandle, LinkMask),
    Deinit(StackHandle),
    Process(StackHandle),
    PutMsg {
        handle: StackHandle,
        id: MessageId,
        payload: Vec<u8>,
    },
    SetOption(StackHandle, StackOption),
    FactoryReset(StackHandle),
    ConnectionRequest(StackHandle, bool),
    BulkCancel {
        handle: StackHandle,
        file_id: u32,
        reason: RejectReason,
    },
    ReleaseBuffer {
        handle: StackHandle,
        file_id: u32,
        len: usize,
    },
}

impl StackCall {
    pub fn op(&self) -> StackOp {
        match self {
            StackCall::PlatformInit => StackOp::PlatformInit,
            StackCall::Init(_) => StackOp::Init,
            StackCall::Start(..) => StackOp::Start,
            StackCall::Stop(..) => StackOp::Stop,
            StackCall::Deinit(_) => StackOp::Deinit,
            StackCall::Process(_) => StackOp::Process,
            StackCall::PutMsg { .. } => StackOp::PutMsg,
            StackCall::SetOption(..) => StackOp::SetOption,
            StackCall::FactoryReset(_) => StackOp::FactoryReset,
            StackCall::ConnectionRequest(..) => StackOp::ConnectionRequest,
            StackCall::BulkCancel { .. } => StackOp::BulkCancel,
            StackCall::ReleaseBuffer { .. } => StackOp::ReleaseBuffer,
        }
    }
}

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct StackState {
    calls: Vec<StackCall>,
    failures: HashSet<StackOp>,
    next_handle: u32,
    next_msg_id: MessageId,
    live: Option<StackHandle>,
    unacknowledged: VecDeque<MessageId>,
    auto_ack: bool,
}

impl Default for StackState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            failures: HashSet::new(),
            next_handle: 1,
            next_msg_id: 1,
            live: None,
            unacknowledged: VecDeque::new(),
            auto_ack: true,
        }
    }
}

impl StackState {
    /// Record the call, then fail it if a failure was injected for its operation
    fn record(&mut self, call: StackCall) -> SidResult<()> {
        let op = call.op();
        self.calls.push(call);
        if self.failures.contains(&op) {
            debug!("Injected failure for {:?}", op);
            return Err(SidError::Stack {
                code: INJECTED_FAILURE,
            });
        }
        Ok(())
    }

    fn allocate_msg_id(&mut self) -> MessageId {
        let id = self.next_msg_id;
        self.next_msg_id = match self.next_msg_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }
}

fn lock(state: &Mutex<StackState>) -> MutexGuard<'_, StackState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ----------------------------------------------------------------------------
// Stack Probe
// ----------------------------------------------------------------------------

/// Observer and failure injector for a [`RecordingStack`]
#[derive(Debug, Clone)]
pub struct StackProbe {
    state: Arc<Mutex<StackState>>,
}

impl StackProbe {
    pub fn calls(&self) -> Vec<StackCall> {
        lock(&self.state).calls.clone()
    }

    /// Operations in call order
    pub fn ops(&self) -> Vec<StackOp> {
        lock(&self.state).calls.iter().map(StackCall::op).collect()
    }

    pub fn count(&self, op: StackOp) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// Make every subsequent call of `op` fail
    pub fn fail(&self, op: StackOp) {
        lock(&self.state).failures.insert(op);
    }

    pub fn succeed(&self, op: StackOp) {
        lock(&self.state).failures.remove(&op);
    }

    pub fn set_auto_ack(&self, enabled: bool) {
        lock(&self.state).auto_ack = enabled;
    }

    /// Handle of the instance currently alive, if any
    pub fn live_handle(&self) -> Option<StackHandle> {
        lock(&self.state).live
    }

    /// Ids accepted by `put_msg` and not yet acknowledged
    pub fn unacknowledged(&self) -> Vec<MessageId> {
        lock(&self.state).unacknowledged.iter().copied().collect()
    }

    /// Link masks passed to `start`, in order
    pub fn started_masks(&self) -> Vec<LinkMask> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                StackCall::Start(_, mask) => Some(*mask),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.state).calls.clear();
    }
}

// ----------------------------------------------------------------------------
// Recording Stack
// ----------------------------------------------------------------------------

pub struct RecordingStack {
    state: Arc<Mutex<StackState>>,
    callbacks: Option<Arc<dyn StackCallbacks>>,
    ble: Option<(Box<dyn BleAdapterInterface>, BleConfig)>,
}

impl RecordingStack {
    pub fn new() -> (Self, StackProbe) {
        let state = Arc::new(Mutex::new(StackState::default()));
        let stack = Self {
            state: state.clone(),
            callbacks: None,
            ble: None,
        };
        (stack, StackProbe { state })
    }

    /// Deliver notifications to `callbacks`
    pub fn with_callbacks(mut self, callbacks: Arc<dyn StackCallbacks>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// Drive a BLE adapter whenever the stack runs on the BLE link
    pub fn with_ble(mut self, adapter: Box<dyn BleAdapterInterface>, config: BleConfig) -> Self {
        self.ble = Some((adapter, config));
        self
    }

    fn bring_up_ble(&mut self) -> SidResult<()> {
        let Some((adapter, config)) = self.ble.as_mut() else {
            return Ok(());
        };

        adapter.init(Some(config))?;
        adapter.set_callback(Some(&logging_callbacks()))?;
        adapter.start_service()?;
        adapter.start_adv()
    }
}

impl SidewalkStack for RecordingStack {
    fn platform_init(&mut self, _params: &PlatformParameters) -> SidResult<()> {
        lock(&self.state).record(StackCall::PlatformInit)
    }

    fn init(&mut self, config: &StackConfig) -> SidResult<StackHandle> {
        let mut state = lock(&self.state);
        state.record(StackCall::Init(config.link_mask))?;

        let handle = StackHandle::new(state.next_handle);
        state.next_handle += 1;
        state.live = Some(handle);
        Ok(handle)
    }

    fn start(&mut self, handle: StackHandle, link_mask: LinkMask) -> SidResult<()> {
        lock(&self.state).record(StackCall::Start(handle, link_mask))?;
        info!("Recording stack started {} on {}", handle, link_mask);

        if link_mask.contains(LinkType::Ble) {
            self.bring_up_ble()?;
        }
        Ok(())
    }

    fn stop(&mut self, handle: StackHandle, link_mask: LinkMask) -> SidResult<()> {
        lock(&self.state).record(StackCall::Stop(handle, link_mask))
    }

    fn deinit(&mut self, handle: StackHandle) -> SidResult<()> {
        {
            let mut state = lock(&self.state);
            state.record(StackCall::Deinit(handle))?;
            if state.live == Some(handle) {
                state.live = None;
            }
            state.unacknowledged.clear();
        }

        if let Some((adapter, _)) = self.ble.as_mut() {
            adapter.deinit()?;
        }
        Ok(())
    }

    fn process(&mut self, handle: StackHandle) -> SidResult<()> {
        let acknowledged: Vec<MessageId> = {
            let mut state = lock(&self.state);
            state.record(StackCall::Process(handle))?;
            if state.auto_ack {
                state.unacknowledged.drain(..).collect()
            } else {
                Vec::new()
            }
        };

        // Callbacks run without the state lock held.
        if let Some(callbacks) = &self.callbacks {
            for id in acknowledged {
                callbacks.on_msg_sent(id);
            }
        }
        Ok(())
    }

    fn put_msg(
        &mut self,
        handle: StackHandle,
        payload: &[u8],
        desc: &mut MessageDescriptor,
    ) -> SidResult<()> {
        {
            let mut state = lock(&self.state);
            let id = state.next_msg_id;
            state.record(StackCall::PutMsg {
                handle,
                id,
                payload: payload.to_vec(),
            })?;

            desc.id = state.allocate_msg_id();
            state.unacknowledged.push_back(desc.id);
        }

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_event_pending();
        }
        Ok(())
    }

    fn set_option(&mut self, handle: StackHandle, option: &StackOption) -> SidResult<()> {
        lock(&self.state).record(StackCall::SetOption(handle, *option))
    }

    fn set_factory_reset(&mut self, handle: StackHandle) -> SidResult<()> {
        lock(&self.state).record(StackCall::FactoryReset(handle))
    }

    fn ble_connection_request(&mut self, handle: StackHandle, enable: bool) -> SidResult<()> {
        lock(&self.state).record(StackCall::ConnectionRequest(handle, enable))
    }

    fn bulk_transfer_cancel(
        &mut self,
        handle: StackHandle,
        file_id: u32,
        reason: RejectReason,
    ) -> SidResult<()> {
        lock(&self.state).record(StackCall::BulkCancel {
            handle,
            file_id,
            reason,
        })
    }

    fn bulk_transfer_release_buffer(
        &mut self,
        handle: StackHandle,
        file_id: u32,
        buffer: Vec<u8>,
    ) -> SidResult<()> {
        lock(&self.state).record(StackCall::ReleaseBuffer {
            handle,
            file_id,
            len: buffer.len(),
        })
    }
}

/// Callback set that only logs what the BLE adapter reports
fn logging_callbacks() -> BleCallbackSet {
    BleCallbackSet::new()
        .with_conn(|connected, peer| info!("BLE link {} {}", peer, if connected { "up" } else { "down" }))
        .with_mtu(|mtu| debug!("BLE MTU {}", mtu))
        .with_adv_start(|| debug!("BLE advertising"))
        .with_ind(|ok| debug!("BLE indication confirmed: {}", ok))
        .with_data(|service, data| info!("BLE {} bytes on {}", data.len(), service))
        .with_notify(|service, enabled| debug!("BLE notify {} {}", service, enabled))
}
