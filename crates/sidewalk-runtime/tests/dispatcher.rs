//! Event dispatcher scenarios, driven synchronously one event at a time

use std::sync::Arc;

use sidewalk_core::{
    AutoConnectParams, ConnectionPolicy, LinkMask, LinkType, MessageType, OutboundMessage,
    LockMode, PendingMessages, RejectReason, SidError, SidState, SidStatus, StackOption,
    TransferChunk,
};
use sidewalk_harness::{
    FileTransferCall, MemoryFirmware, MemorySettings, PanicOnReboot, RecordingFileTransfer,
    RecordingStack, StackCall, StackOp, StackProbe, StaticMfgStore,
};
use sidewalk_runtime::{
    chunk_digest, Collaborators, DeviceConfig, EventDispatcher, Flow, RuntimeState, SidewalkEvent,
};

// ----------------------------------------------------------------------------
// Test Rig
// ----------------------------------------------------------------------------

struct Rig {
    dispatcher: EventDispatcher,
    probe: StackProbe,
    settings: MemorySettings,
    firmware: MemoryFirmware,
    transfer: RecordingFileTransfer,
    registry: Arc<PendingMessages>,
}

impl Rig {
    fn new(config: DeviceConfig) -> Self {
        Self::with_parts(config, MemorySettings::new(), MemoryFirmware::new())
    }

    fn with_parts(config: DeviceConfig, settings: MemorySettings, firmware: MemoryFirmware) -> Self {
        let (stack, probe) = RecordingStack::new();
        let transfer = RecordingFileTransfer::new();
        let registry = Arc::new(PendingMessages::new());

        let collaborators = Collaborators::new(Box::new(stack))
            .with_link_mask_store(Box::new(settings.clone()))
            .with_mfg_store(Box::new(StaticMfgStore::valid()))
            .with_firmware(Box::new(firmware.clone()))
            .with_file_transfer(Box::new(transfer.clone()))
            .with_system_control(Box::new(PanicOnReboot));

        Self {
            dispatcher: EventDispatcher::new(config, registry.clone(), collaborators),
            probe,
            settings,
            firmware,
            transfer,
            registry,
        }
    }

    /// Rig that went through platform init and autostart
    fn started(config: DeviceConfig) -> Self {
        let mut rig = Self::new(config);
        rig.dispatch(SidewalkEvent::PlatformInit).unwrap();
        rig.dispatch(SidewalkEvent::Autostart).unwrap();
        rig.probe.clear();
        rig
    }

    fn dispatch(&mut self, event: SidewalkEvent) -> Result<Flow, SidError> {
        self.dispatcher.dispatch(event)
    }

    fn send(&mut self, data: &[u8]) -> Result<Flow, SidError> {
        self.dispatch(SidewalkEvent::send(OutboundMessage::new(
            MessageType::Notify,
            data.to_vec(),
        )))
    }

    fn mask(&self) -> LinkMask {
        self.dispatcher.context().link_mask()
    }
}

fn auto_connect_options() -> Vec<StackOption> {
    vec![
        StackOption::LinkConnectionPolicy(ConnectionPolicy::AutoConnect),
        StackOption::LinkPolicyAutoConnectParams(AutoConnectParams {
            link_type: LinkType::Ble,
            enable: true,
            priority: 0,
            connection_attempt_timeout_secs: 30,
        }),
    ]
}

fn options(probe: &StackProbe) -> Vec<StackOption> {
    probe
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StackCall::SetOption(_, option) => Some(option),
            _ => None,
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Startup
// ----------------------------------------------------------------------------

#[test]
fn platform_init_marks_platform_ready() {
    let mut rig = Rig::new(DeviceConfig::default());

    assert_eq!(rig.dispatch(SidewalkEvent::PlatformInit), Ok(Flow::Continue));
    assert_eq!(rig.dispatcher.context().state, RuntimeState::PlatformReady);
    assert_eq!(rig.probe.ops(), vec![StackOp::PlatformInit]);
}

#[test]
fn platform_init_failures_do_not_crash() {
    let mut rig = Rig::new(DeviceConfig::default());
    rig.probe.fail(StackOp::PlatformInit);
    assert_eq!(rig.dispatch(SidewalkEvent::PlatformInit), Ok(Flow::Continue));
    assert_eq!(rig.dispatcher.context().state, RuntimeState::Uninitialized);

    let (stack, _probe) = RecordingStack::new();
    let collaborators = Collaborators::new(Box::new(stack))
        .with_mfg_store(Box::new(StaticMfgStore::mismatched()));
    let mut dispatcher = EventDispatcher::new(
        DeviceConfig::default(),
        Arc::new(PendingMessages::new()),
        collaborators,
    );
    assert_eq!(dispatcher.dispatch(SidewalkEvent::PlatformInit), Ok(Flow::Continue));
    assert_eq!(dispatcher.context().state, RuntimeState::Uninitialized);
}

#[test]
fn autostart_without_persistence_uses_configured_mask() {
    let mut config = DeviceConfig::default();
    config.link_mask = LinkMask::FSK;
    let mut rig = Rig::new(config);

    rig.dispatch(SidewalkEvent::PlatformInit).unwrap();
    rig.dispatch(SidewalkEvent::Autostart).unwrap();

    assert_eq!(rig.mask(), LinkMask::FSK);
    assert_eq!(rig.probe.started_masks(), vec![LinkMask::FSK]);
    assert_eq!(rig.dispatcher.context().state, RuntimeState::Started);
    assert!(rig.settings.writes().is_empty());
    assert!(options(&rig.probe).is_empty());
}

#[test]
fn autostart_zero_mask_falls_back_to_default() {
    let mut config = DeviceConfig::default();
    config.link_mask = LinkMask::NONE;
    let rig = Rig::started(config);

    assert_eq!(rig.mask(), LinkMask::DEFAULT);
}

#[test]
fn autostart_restores_persisted_mask() {
    let config = DeviceConfig::full_featured();
    let settings = MemorySettings::with_mask(LinkMask::BLE | LinkMask::LORA);
    let mut rig = Rig::with_parts(config, settings, MemoryFirmware::new());

    rig.dispatch(SidewalkEvent::PlatformInit).unwrap();
    rig.dispatch(SidewalkEvent::Autostart).unwrap();

    assert_eq!(rig.mask(), LinkMask::BLE | LinkMask::LORA);
    assert!(rig.settings.writes().is_empty());
}

#[test]
fn autostart_missing_mask_stores_default() {
    let mut rig = Rig::new(DeviceConfig::full_featured());

    rig.dispatch(SidewalkEvent::Autostart).unwrap();

    assert_eq!(rig.mask(), LinkMask::DEFAULT);
    assert_eq!(rig.settings.stored(), Some(LinkMask::DEFAULT));
}

#[test]
fn autostart_unreadable_settings_fall_back_to_default() {
    let mut config = DeviceConfig::full_featured();
    config.link_mask = LinkMask::FSK;
    let settings = MemorySettings::with_mask(LinkMask::FSK);
    settings.fail_load(true);
    let mut rig = Rig::with_parts(config, settings, MemoryFirmware::new());

    rig.dispatch(SidewalkEvent::Autostart).unwrap();

    assert_eq!(rig.mask(), LinkMask::DEFAULT);
    assert_eq!(rig.settings.writes(), vec![LinkMask::DEFAULT]);
}

#[test]
fn autostart_full_featured_sequence() {
    let mut rig = Rig::new(DeviceConfig::full_featured());
    rig.dispatch(SidewalkEvent::PlatformInit).unwrap();
    rig.dispatch(SidewalkEvent::Autostart).unwrap();

    let handle = rig.dispatcher.context().handle.unwrap();
    assert_eq!(
        rig.probe.ops(),
        vec![
            StackOp::PlatformInit,
            StackOp::Init,
            StackOp::Start,
            StackOp::SetOption,
            StackOp::SetOption
        ]
    );
    assert_eq!(options(&rig.probe), auto_connect_options());
    assert_eq!(rig.firmware.confirms(), 1);
    assert_eq!(rig.transfer.calls(), vec![FileTransferCall::Init(handle)]);
}

#[test]
fn autostart_init_failure_stops_early() {
    let mut rig = Rig::new(DeviceConfig::full_featured());
    rig.probe.fail(StackOp::Init);

    assert_eq!(rig.dispatch(SidewalkEvent::Autostart), Ok(Flow::Continue));
    assert_eq!(rig.dispatcher.context().handle, None);
    assert_eq!(rig.probe.ops(), vec![StackOp::Init]);
    assert_eq!(rig.firmware.confirms(), 0);
    assert!(rig.transfer.calls().is_empty());
}

#[test]
fn autostart_start_failure_continues() {
    let mut rig = Rig::new(DeviceConfig::full_featured());
    rig.probe.fail(StackOp::Start);
    rig.probe.fail(StackOp::SetOption);

    rig.dispatch(SidewalkEvent::Autostart).unwrap();

    assert!(rig.dispatcher.context().handle.is_some());
    assert_eq!(rig.probe.count(StackOp::SetOption), 2);
    assert_eq!(rig.transfer.calls().len(), 1);
}

#[test]
fn second_autostart_is_ignored() {
    let mut rig = Rig::started(DeviceConfig::default());
    let handle = rig.dispatcher.context().handle;

    rig.dispatch(SidewalkEvent::Autostart).unwrap();
    assert_eq!(rig.dispatcher.context().handle, handle);
    assert!(rig.probe.ops().is_empty());
}

// ----------------------------------------------------------------------------
// Messaging
// ----------------------------------------------------------------------------

#[test]
fn send_registers_a_private_copy() {
    let mut rig = Rig::started(DeviceConfig::default());
    let payload = b"sensor reading".to_vec();

    assert_eq!(rig.send(&payload), Ok(Flow::Continue));
    assert_eq!(rig.registry.ids(), vec![1]);

    let pending = rig
        .registry
        .take_by_id(1, LockMode::Blocking)
        .unwrap();
    assert_eq!(pending.payload(), payload.as_slice());
    assert_eq!(pending.descriptor().msg_type, MessageType::Notify);
    assert_eq!(
        rig.registry.take_by_id(1, LockMode::Blocking),
        Err(SidError::NotFound)
    );
}

#[test]
fn failed_submission_leaves_registry_unchanged() {
    let mut rig = Rig::started(DeviceConfig::default());
    rig.send(b"first").unwrap();
    rig.probe.fail(StackOp::PutMsg);

    assert_eq!(
        rig.send(b"second"),
        Err(SidError::Stack {
            code: sidewalk_harness::stack::INJECTED_FAILURE
        })
    );
    assert_eq!(rig.registry.ids(), vec![1]);
}

#[test]
fn send_without_message_or_stack_is_rejected() {
    let mut rig = Rig::new(DeviceConfig::default());

    assert_eq!(
        rig.dispatch(SidewalkEvent::SendMessage(None)),
        Err(SidError::InvalidArgs)
    );
    assert_eq!(rig.send(b"early"), Err(SidError::NullPointer));
    assert!(rig.registry.is_empty());
}

#[test]
fn new_status_is_recorded() {
    let mut rig = Rig::started(DeviceConfig::default());
    let status = SidStatus {
        state: SidState::Ready,
        registered: true,
        time_synced: true,
        link_status_mask: LinkMask::BLE,
    };

    assert_eq!(rig.dispatch(SidewalkEvent::status(status)), Ok(Flow::Continue));
    assert_eq!(rig.dispatcher.context().last_status, Some(status));
    assert_eq!(
        rig.dispatch(SidewalkEvent::NewStatus(None)),
        Err(SidError::InvalidArgs)
    );
    assert_eq!(rig.dispatcher.context().last_status, Some(status));
}

#[test]
fn connect_requires_ble_in_mask() {
    let mut config = DeviceConfig::default();
    config.link_mask = LinkMask::FSK;
    let mut rig = Rig::started(config);

    assert_eq!(rig.dispatch(SidewalkEvent::Connect), Err(SidError::NoSupport));
    assert_eq!(rig.probe.count(StackOp::ConnectionRequest), 0);

    let mut rig = Rig::started(DeviceConfig::default());
    let handle = rig.dispatcher.context().handle.unwrap();
    assert_eq!(rig.dispatch(SidewalkEvent::Connect), Ok(Flow::Continue));
    assert_eq!(
        rig.probe.calls(),
        vec![StackCall::ConnectionRequest(handle, true)]
    );
}

#[test]
fn factory_reset_clears_persisted_mask() {
    let mut rig = Rig::started(DeviceConfig::full_featured());
    let handle = rig.dispatcher.context().handle.unwrap();

    rig.dispatch(SidewalkEvent::FactoryReset).unwrap();

    assert_eq!(rig.settings.stored(), Some(LinkMask::NONE));
    assert_eq!(rig.probe.calls(), vec![StackCall::FactoryReset(handle)]);
}

// ----------------------------------------------------------------------------
// Link Switch
// ----------------------------------------------------------------------------

#[test]
fn link_switch_walks_the_cycle() {
    let mut rig = Rig::started(DeviceConfig::default());
    let mut seen = Vec::new();

    for _ in 0..4 {
        rig.dispatch(SidewalkEvent::LinkSwitch).unwrap();
        seen.push(rig.mask());
    }

    assert_eq!(
        seen,
        vec![
            LinkMask::FSK,
            LinkMask::BLE | LinkMask::LORA,
            LinkMask::BLE,
            LinkMask::FSK
        ]
    );
    assert_eq!(rig.probe.started_masks(), seen);
    assert_eq!(rig.dispatcher.context().state, RuntimeState::Started);
}

#[test]
fn link_switch_step_order() {
    let mut rig = Rig::started(DeviceConfig::full_featured());
    let old = rig.dispatcher.context().handle.unwrap();

    rig.dispatch(SidewalkEvent::LinkSwitch).unwrap();
    let new = rig.dispatcher.context().handle.unwrap();

    assert_ne!(old, new);
    assert_eq!(
        rig.probe.calls(),
        vec![
            StackCall::Process(old),
            StackCall::Deinit(old),
            StackCall::Init(LinkMask::FSK),
            StackCall::Start(new, LinkMask::FSK),
        ]
    );
    assert_eq!(
        rig.transfer.calls()[1..],
        [FileTransferCall::Deinit(old), FileTransferCall::Init(new)]
    );
    assert_eq!(rig.settings.stored(), Some(LinkMask::FSK));
}

#[test]
fn link_switch_back_to_ble_reapplies_auto_connect() {
    let settings = MemorySettings::with_mask(LinkMask::BLE | LinkMask::LORA);
    let mut rig = Rig::with_parts(DeviceConfig::full_featured(), settings, MemoryFirmware::new());
    rig.dispatch(SidewalkEvent::Autostart).unwrap();
    rig.probe.clear();

    rig.dispatch(SidewalkEvent::LinkSwitch).unwrap();

    assert_eq!(rig.mask(), LinkMask::BLE);
    assert_eq!(options(&rig.probe), auto_connect_options());
}

#[test]
fn link_switch_attempts_every_step() {
    let mut rig = Rig::started(DeviceConfig::full_featured());
    rig.settings.fail_store(true);
    rig.probe.fail(StackOp::Process);
    rig.probe.fail(StackOp::Deinit);
    rig.probe.fail(StackOp::Start);

    assert_eq!(rig.dispatch(SidewalkEvent::LinkSwitch), Ok(Flow::Continue));
    assert_eq!(
        rig.probe.ops(),
        vec![StackOp::Process, StackOp::Deinit, StackOp::Init, StackOp::Start]
    );
    assert_eq!(rig.mask(), LinkMask::FSK);
}

#[test]
fn link_switch_survives_init_failure() {
    let mut rig = Rig::started(DeviceConfig::default());
    rig.probe.fail(StackOp::Init);

    assert_eq!(rig.dispatch(SidewalkEvent::LinkSwitch), Ok(Flow::Continue));
    assert_eq!(rig.dispatcher.context().handle, None);
    assert_eq!(rig.probe.count(StackOp::Start), 0);

    // The next switch has nothing to tear down and recovers.
    rig.probe.succeed(StackOp::Init);
    rig.dispatch(SidewalkEvent::LinkSwitch).unwrap();
    assert!(rig.dispatcher.context().handle.is_some());
    assert_eq!(rig.mask(), LinkMask::BLE | LinkMask::LORA);
}

// ----------------------------------------------------------------------------
// File Transfer
// ----------------------------------------------------------------------------

#[test]
fn chunk_is_staged_and_released() {
    let mut rig = Rig::started(DeviceConfig::full_featured());
    let handle = rig.dispatcher.context().handle.unwrap();

    let chunk = TransferChunk::new(7, 2, vec![0xAB, 0xCD]);
    assert_eq!(rig.dispatch(SidewalkEvent::chunk(chunk)), Ok(Flow::Continue));

    assert_eq!(rig.firmware.writes(), vec![(2, 2)]);
    assert_eq!(rig.firmware.image()[2..], [0xAB, 0xCD]);
    assert_eq!(
        rig.probe.calls(),
        vec![StackCall::ReleaseBuffer {
            handle,
            file_id: 7,
            len: 2
        }]
    );
}

#[test]
fn rejected_chunk_cancels_and_still_releases() {
    let firmware = MemoryFirmware::with_capacity(4);
    let mut rig = Rig::with_parts(
        DeviceConfig::full_featured(),
        MemorySettings::new(),
        firmware,
    );
    rig.dispatch(SidewalkEvent::Autostart).unwrap();
    rig.probe.clear();
    let handle = rig.dispatcher.context().handle.unwrap();

    let chunk = TransferChunk::new(9, 0, vec![0; 16]);
    assert_eq!(
        rig.dispatch(SidewalkEvent::chunk(chunk)),
        Err(SidError::OutOfResources)
    );

    assert_eq!(rig.firmware.cancels(), 1);
    assert_eq!(
        rig.probe.calls(),
        vec![
            StackCall::BulkCancel {
                handle,
                file_id: 9,
                reason: RejectReason::FileTooBig
            },
            StackCall::ReleaseBuffer {
                handle,
                file_id: 9,
                len: 16
            },
        ]
    );
}

#[test]
fn chunk_without_file_transfer_is_released() {
    let mut rig = Rig::started(DeviceConfig::default());

    let chunk = TransferChunk::new(1, 0, vec![1, 2, 3]);
    assert_eq!(
        rig.dispatch(SidewalkEvent::chunk(chunk)),
        Err(SidError::NoSupport)
    );
    assert_eq!(rig.probe.ops(), vec![StackOp::ReleaseBuffer]);
    assert!(rig.firmware.writes().is_empty());
}

#[test]
fn missing_chunk_is_rejected() {
    let mut rig = Rig::started(DeviceConfig::full_featured());

    assert_eq!(
        rig.dispatch(SidewalkEvent::FileTransfer(None)),
        Err(SidError::InvalidArgs)
    );
    assert!(rig.probe.ops().is_empty());
}

#[test]
fn chunk_digest_is_upper_case_sha256() {
    assert_eq!(
        chunk_digest(b"abc"),
        "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
    );
}

// ----------------------------------------------------------------------------
// Teardown
// ----------------------------------------------------------------------------

#[test]
fn exit_releases_every_pending_message() {
    let mut rig = Rig::started(DeviceConfig::full_featured());
    let handle = rig.dispatcher.context().handle.unwrap();
    for payload in [&b"a"[..], b"bb", b"ccc"] {
        rig.send(payload).unwrap();
    }
    rig.probe.clear();

    assert_eq!(
        rig.dispatch(SidewalkEvent::Exit),
        Ok(Flow::Exited { released: 3 })
    );
    assert!(rig.registry.is_empty());
    assert_eq!(
        rig.probe.calls(),
        vec![StackCall::Process(handle), StackCall::Deinit(handle)]
    );
    assert_eq!(
        rig.transfer.calls().last(),
        Some(&FileTransferCall::Deinit(handle))
    );
    assert_eq!(rig.dispatcher.context().state, RuntimeState::Exited);
}

#[test]
fn exit_on_empty_registry_is_a_no_op() {
    let mut rig = Rig::new(DeviceConfig::default());

    assert_eq!(
        rig.dispatch(SidewalkEvent::Exit),
        Ok(Flow::Exited { released: 0 })
    );
    assert!(rig.probe.ops().is_empty());
    assert_eq!(
        rig.dispatch(SidewalkEvent::Exit),
        Ok(Flow::Exited { released: 0 })
    );
}

#[test]
#[should_panic(expected = "reboot requested")]
fn reboot_hands_over_to_system_control() {
    let mut rig = Rig::started(DeviceConfig::default());
    let _ = rig.dispatch(SidewalkEvent::Reboot);
}
