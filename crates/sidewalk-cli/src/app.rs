//! Simulated end device
//!
//! Wires the runtime to the in-memory stack, BLE host and storage from
//! `sidewalk-harness` and drives it through one lifecycle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sidewalk_ble::BleAdapter;
use sidewalk_core::{
    LinkMask, MessageType, OutboundMessage, PendingMessages, ProcessRestart, TransferChunk,
};
use sidewalk_harness::{
    FakeBleHost, MemoryFirmware, MemorySettings, RecordingFileTransfer, RecordingStack,
    StackOp, StackProbe, StaticMfgStore,
};
use sidewalk_runtime::{RuntimeBuilder, RuntimeHandle, SidewalkEvent};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

const SIMULATED_FILE_ID: u32 = 0x0000_0001;

// ----------------------------------------------------------------------------
// Scenario Report
// ----------------------------------------------------------------------------

/// What happened during one simulated lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub sent: usize,
    pub acknowledged: usize,
    /// Messages still pending at exit, released by the runtime
    pub released: usize,
    /// Link masks the stack was started with, in order
    pub started_masks: Vec<LinkMask>,
    pub final_mask: LinkMask,
    /// Bytes staged into firmware storage by file transfer
    pub staged_bytes: usize,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Messages sent:         {}", self.sent)?;
        writeln!(f, "Messages acknowledged: {}", self.acknowledged)?;
        writeln!(f, "Released at exit:      {}", self.released)?;
        let masks: Vec<String> = self
            .started_masks
            .iter()
            .map(|mask| format!("{} ({:#x})", mask, mask.bits()))
            .collect();
        writeln!(f, "Stack starts:          {}", masks.join(" -> "))?;
        writeln!(
            f,
            "Final link:            {} ({:#x})",
            self.final_mask,
            self.final_mask.bits()
        )?;
        write!(f, "Staged firmware bytes: {}", self.staged_bytes)
    }
}

// ----------------------------------------------------------------------------
// Simulated Device
// ----------------------------------------------------------------------------

pub struct SimulatedDevice {
    config: AppConfig,
    handle: RuntimeHandle,
    registry: Arc<PendingMessages>,
    probe: StackProbe,
    host: FakeBleHost,
    firmware: MemoryFirmware,
}

impl SimulatedDevice {
    /// Build the runtime around in-memory collaborators and start its event task
    pub async fn start(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let builder = RuntimeBuilder::new(config.device.clone());
        let host = FakeBleHost::new();
        let firmware = MemoryFirmware::new();
        let (stack, probe) = RecordingStack::new();
        let stack = stack
            .with_callbacks(Arc::new(builder.stack_events()))
            .with_ble(Box::new(BleAdapter::new(host.clone())), config.ble.clone());
        let registry = builder.registry();

        let handle = builder
            .with_stack(Box::new(stack))
            .with_link_mask_store(Box::new(MemorySettings::new()))
            .with_mfg_store(Box::new(StaticMfgStore::valid()))
            .with_firmware(Box::new(firmware.clone()))
            .with_file_transfer(Box::new(RecordingFileTransfer::new()))
            .with_system_control(Box::new(ProcessRestart))
            .build_and_start()
            .await?;

        Ok(Self {
            config,
            handle,
            registry,
            probe,
            host,
            firmware,
        })
    }

    pub fn host(&self) -> &FakeBleHost {
        &self.host
    }

    /// Bring the device up, send messages, switch links and exit
    pub async fn run(self, messages: usize, switches: usize) -> Result<ScenarioReport> {
        self.handle.post(SidewalkEvent::PlatformInit).await?;
        self.handle.post(SidewalkEvent::Autostart).await?;

        for n in 0..messages {
            let payload = format!("uplink #{}", n);
            let message = OutboundMessage::new(MessageType::Notify, payload.into_bytes());
            self.handle.post(SidewalkEvent::send(message)).await?;
        }
        self.wait_for_acknowledgments(messages).await;
        let acknowledged = messages.saturating_sub(self.registry.len());

        for _ in 0..switches {
            self.handle.post(SidewalkEvent::LinkSwitch).await?;
        }

        if self.config.device.file_transfer.enabled {
            let data = vec![0xA5; self.config.cli.transfer_chunk_size];
            let chunk = TransferChunk::new(SIMULATED_FILE_ID, 0, data);
            self.handle.post(SidewalkEvent::chunk(chunk)).await?;
        }

        let released = self.registry.len();
        let dispatcher = self.handle.shutdown().await?;
        if !self.registry.is_empty() {
            return Err(CliError::Scenario(format!(
                "{} messages still pending after exit",
                self.registry.len()
            )));
        }

        let report = ScenarioReport {
            sent: messages,
            acknowledged,
            released,
            started_masks: self.probe.started_masks(),
            final_mask: dispatcher.context().link_mask(),
            staged_bytes: self.firmware.image().len(),
        };
        info!(
            "Scenario finished: {}/{} acknowledged",
            report.acknowledged, report.sent
        );
        Ok(report)
    }

    async fn wait_for_acknowledgments(&self, expected: usize) {
        let limit = Duration::from_millis(self.config.cli.ack_timeout_ms);
        let probe = &self.probe;
        let registry = &self.registry;

        let settled = timeout(limit, async {
            // An entry is always in the stack or the registry between submission and ack.
            while probe.count(StackOp::PutMsg) < expected
                || !probe.unacknowledged().is_empty()
                || !registry.is_empty()
            {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        if settled.is_err() {
            warn!(
                "{} messages still unacknowledged after {:?}",
                registry.len(),
                limit
            );
        }
    }
}
