//! Radio host capability
//!
//! [`BleHost`] is everything the adapter needs from the platform's BLE
//! stack. [`GattEvents`] is the sink the host calls back into, from its own
//! context, when something happens on the radio.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::BleConfig;
use crate::error::HostResult;
use crate::protocol::{PeerAddress, ServiceId};

/// Host-assigned identifier of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

/// Host-assigned handle of a GATT attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeHandle(pub u16);

// ----------------------------------------------------------------------------
// Host Operations
// ----------------------------------------------------------------------------

pub trait BleHost: Send {
    /// Power up the radio and the host stack
    fn enable(&mut self, config: &BleConfig) -> HostResult<()>;

    /// Restore persisted bonding and service configuration
    fn load_settings(&mut self) -> HostResult<()>;

    fn disable(&mut self) -> HostResult<()>;

    /// Install the notification sink; replaces any previous one
    fn register_events(&mut self, events: Arc<dyn GattEvents>);

    fn unregister_events(&mut self);

    fn adv_start(&mut self) -> HostResult<()>;

    fn adv_stop(&mut self) -> HostResult<()>;

    fn adv_update(&mut self, data: &[u8]) -> HostResult<()>;

    /// Negotiated transmission unit for the connection
    fn mtu(&self, conn: Option<ConnHandle>) -> u16;

    /// Whether the peer enabled notifications for the service
    fn is_subscribed(&self, conn: Option<ConnHandle>, service: ServiceId) -> bool;

    fn find_characteristic(&self, uuid: &Uuid) -> Option<AttributeHandle>;

    /// Send a notification; the host copies `data` before returning
    fn notify(
        &mut self,
        conn: Option<ConnHandle>,
        attribute: AttributeHandle,
        data: &[u8],
    ) -> HostResult<()>;
}

// ----------------------------------------------------------------------------
// Host Notifications
// ----------------------------------------------------------------------------

/// Notifications delivered by the host
pub trait GattEvents: Send + Sync {
    /// Outcome of a connection attempt
    fn connected(&self, conn: ConnHandle, peer: PeerAddress, result: HostResult<()>);

    fn disconnected(&self, conn: ConnHandle, peer: PeerAddress, reason: u8);

    fn mtu_updated(&self, conn: ConnHandle, mtu: u16);

    /// Client characteristic configuration written by the peer
    fn ccc_changed(&self, service: ServiceId, enabled: bool);

    fn indication_confirmed(&self, success: bool);

    fn advertising_started(&self);

    /// Peer wrote to the service's write characteristic; returns bytes accepted
    fn receive_write(&self, service: ServiceId, data: &[u8]) -> usize;
}
