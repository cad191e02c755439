//! Fake BLE Host
//!
//! A [`BleHost`] with scripted link conditions. Clones share state: keep one
//! clone to adjust the MTU, subscription state or failures, and to fire host
//! notifications into whatever sink the adapter registered.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use sidewalk_ble::{
    AttributeHandle, BleConfig, BleHost, ConnHandle, GattEvents, HostError, HostResult,
    PeerAddress, ServiceId, AMA_NOTIFY_CHARACTERISTIC_UUID,
};
use tracing::debug;
use uuid::Uuid;

/// errno reported by operations told to fail
const ENOENT: i32 = -2;

/// Attribute handle of the AMA notify characteristic
const AMA_NOTIFY_ATTRIBUTE: AttributeHandle = AttributeHandle(0x0012);

/// Host operations that can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    Enable,
    LoadSettings,
    Disable,
    AdvStart,
    AdvStop,
    AdvUpdate,
    Notify,
}

struct HostState {
    enabled: bool,
    advertising: bool,
    adv_data: Vec<u8>,
    mtu: u16,
    subscribed: bool,
    characteristic_present: bool,
    failures: HashSet<HostOp>,
    events: Option<Arc<dyn GattEvents>>,
    registrations: usize,
    settings_loads: usize,
    notifications: Vec<Vec<u8>>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            enabled: false,
            advertising: false,
            adv_data: Vec::new(),
            mtu: 23,
            subscribed: false,
            characteristic_present: true,
            failures: HashSet::new(),
            events: None,
            registrations: 0,
            settings_loads: 0,
            notifications: Vec::new(),
        }
    }
}

impl HostState {
    fn check(&self, op: HostOp) -> HostResult<()> {
        if self.failures.contains(&op) {
            return Err(HostError::new(ENOENT));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeBleHost {
    state: Arc<Mutex<HostState>>,
}

impl FakeBleHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------------
    // Link Conditions
    // ------------------------------------------------------------------------

    pub fn set_mtu(&self, mtu: u16) {
        self.lock().mtu = mtu;
    }

    pub fn set_subscribed(&self, subscribed: bool) {
        self.lock().subscribed = subscribed;
    }

    /// Make the notify characteristic unresolvable
    pub fn remove_characteristic(&self) {
        self.lock().characteristic_present = false;
    }

    pub fn fail(&self, op: HostOp) {
        self.lock().failures.insert(op);
    }

    pub fn succeed(&self, op: HostOp) {
        self.lock().failures.remove(&op);
    }

    // ------------------------------------------------------------------------
    // Observations
    // ------------------------------------------------------------------------

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn is_advertising(&self) -> bool {
        self.lock().advertising
    }

    pub fn adv_data(&self) -> Vec<u8> {
        self.lock().adv_data.clone()
    }

    /// Number of times a notification sink was registered
    pub fn registrations(&self) -> usize {
        self.lock().registrations
    }

    pub fn settings_loads(&self) -> usize {
        self.lock().settings_loads
    }

    /// Payloads notified to the peer, in order
    pub fn notifications(&self) -> Vec<Vec<u8>> {
        self.lock().notifications.clone()
    }

    // ------------------------------------------------------------------------
    // Host Notifications
    // ------------------------------------------------------------------------

    /// The registered sink; cloned out so no lock is held while it runs
    fn events(&self) -> Option<Arc<dyn GattEvents>> {
        self.lock().events.clone()
    }

    pub fn connect(&self, conn: ConnHandle, peer: PeerAddress) {
        if let Some(events) = self.events() {
            events.connected(conn, peer, Ok(()));
        }
    }

    pub fn connect_failed(&self, conn: ConnHandle, peer: PeerAddress) {
        if let Some(events) = self.events() {
            events.connected(conn, peer, Err(HostError::new(ENOENT)));
        }
    }

    pub fn disconnect(&self, conn: ConnHandle, peer: PeerAddress, reason: u8) {
        if let Some(events) = self.events() {
            events.disconnected(conn, peer, reason);
        }
    }

    pub fn update_mtu(&self, conn: ConnHandle, mtu: u16) {
        self.set_mtu(mtu);
        if let Some(events) = self.events() {
            events.mtu_updated(conn, mtu);
        }
    }

    pub fn write_ccc(&self, service: ServiceId, enabled: bool) {
        self.set_subscribed(enabled);
        if let Some(events) = self.events() {
            events.ccc_changed(service, enabled);
        }
    }

    pub fn confirm_indication(&self, success: bool) {
        if let Some(events) = self.events() {
            events.indication_confirmed(success);
        }
    }

    /// Peer writes `data`; returns the bytes the adapter accepted
    pub fn peer_write(&self, service: ServiceId, data: &[u8]) -> Option<usize> {
        self.events().map(|events| events.receive_write(service, data))
    }
}

impl BleHost for FakeBleHost {
    fn enable(&mut self, config: &BleConfig) -> HostResult<()> {
        let mut state = self.lock();
        state.check(HostOp::Enable)?;
        state.enabled = true;
        debug!("Fake BLE host enabled as {}", config.device_name);
        Ok(())
    }

    fn load_settings(&mut self) -> HostResult<()> {
        let mut state = self.lock();
        state.check(HostOp::LoadSettings)?;
        state.settings_loads += 1;
        Ok(())
    }

    fn disable(&mut self) -> HostResult<()> {
        let mut state = self.lock();
        state.check(HostOp::Disable)?;
        state.enabled = false;
        state.advertising = false;
        Ok(())
    }

    fn register_events(&mut self, events: Arc<dyn GattEvents>) {
        let mut state = self.lock();
        state.events = Some(events);
        state.registrations += 1;
    }

    fn unregister_events(&mut self) {
        self.lock().events = None;
    }

    fn adv_start(&mut self) -> HostResult<()> {
        let events = {
            let mut state = self.lock();
            state.check(HostOp::AdvStart)?;
            state.advertising = true;
            state.events.clone()
        };

        if let Some(events) = events {
            events.advertising_started();
        }
        Ok(())
    }

    fn adv_stop(&mut self) -> HostResult<()> {
        let mut state = self.lock();
        state.check(HostOp::AdvStop)?;
        state.advertising = false;
        Ok(())
    }

    fn adv_update(&mut self, data: &[u8]) -> HostResult<()> {
        let mut state = self.lock();
        state.check(HostOp::AdvUpdate)?;
        state.adv_data = data.to_vec();
        Ok(())
    }

    fn mtu(&self, _conn: Option<ConnHandle>) -> u16 {
        self.lock().mtu
    }

    fn is_subscribed(&self, _conn: Option<ConnHandle>, service: ServiceId) -> bool {
        service == ServiceId::Ama && self.lock().subscribed
    }

    fn find_characteristic(&self, uuid: &Uuid) -> Option<AttributeHandle> {
        let present = self.lock().characteristic_present;
        (present && *uuid == AMA_NOTIFY_CHARACTERISTIC_UUID).then_some(AMA_NOTIFY_ATTRIBUTE)
    }

    fn notify(
        &mut self,
        _conn: Option<ConnHandle>,
        _attribute: AttributeHandle,
        data: &[u8],
    ) -> HostResult<()> {
        let mut state = self.lock();
        state.check(HostOp::Notify)?;
        state.notifications.push(data.to_vec());
        Ok(())
    }
}
