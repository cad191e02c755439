//! BLE transport adapter
//!
//! State shared with the host's notification context (the active callback
//! table and the live connection) sits behind [`Shared`]; locks are only held
//! long enough to copy a value out, never across a callback invocation.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sidewalk_core::{SidError, SidResult};
use tracing::{debug, error, info, warn};

use crate::callbacks::{BleCallbackSet, CallbackTable};
use crate::config::BleConfig;
use crate::error::HostResult;
use crate::host::{BleHost, ConnHandle, GattEvents};
use crate::protocol::{PeerAddress, ServiceId};

// ----------------------------------------------------------------------------
// Adapter Interface
// ----------------------------------------------------------------------------

/// Operations the protocol stack drives on a short-range transport
pub trait BleAdapterInterface: Send {
    fn init(&mut self, config: Option<&BleConfig>) -> SidResult<()>;

    fn deinit(&mut self) -> SidResult<()>;

    /// Replace the callback set; all six slots must be present
    fn set_callback(&mut self, callbacks: Option<&BleCallbackSet>) -> SidResult<()>;

    fn start_adv(&mut self) -> SidResult<()>;

    fn stop_adv(&mut self) -> SidResult<()>;

    fn set_adv_data(&mut self, data: Option<&[u8]>) -> SidResult<()>;

    fn start_service(&mut self) -> SidResult<()>;

    /// Notify `data` to the peer; the caller keeps its buffer
    fn send(&mut self, service: ServiceId, data: Option<&[u8]>) -> SidResult<()>;
}

/// Create an adapter over `host` and place it in `slot`
pub fn create<H: BleHost>(host: H, slot: Option<&mut Option<BleAdapter<H>>>) -> SidResult<()> {
    let slot = slot.ok_or(SidError::InvalidArgs)?;
    *slot = Some(BleAdapter::new(host));
    Ok(())
}

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

#[derive(Default)]
struct Shared {
    callbacks: RwLock<Option<CallbackTable>>,
    connection: RwLock<Option<ConnHandle>>,
}

impl Shared {
    fn callbacks(&self) -> Option<CallbackTable> {
        read(&self.callbacks).clone()
    }

    fn connection(&self) -> Option<ConnHandle> {
        *read(&self.connection)
    }

    fn set_connection(&self, conn: Option<ConnHandle>) {
        *write(&self.connection) = conn;
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ----------------------------------------------------------------------------
// BLE Adapter
// ----------------------------------------------------------------------------

/// [`BleAdapterInterface`] implementation over a [`BleHost`]
pub struct BleAdapter<H: BleHost> {
    host: H,
    shared: Arc<Shared>,
}

impl<H: BleHost> BleAdapter<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Connection currently tracked by the adapter
    pub fn connection(&self) -> Option<ConnHandle> {
        self.shared.connection()
    }

    /// Sink the host delivers its notifications to
    pub fn events(&self) -> Arc<dyn GattEvents> {
        Arc::new(AdapterEvents {
            shared: self.shared.clone(),
        })
    }
}

impl<H: BleHost> BleAdapterInterface for BleAdapter<H> {
    fn init(&mut self, config: Option<&BleConfig>) -> SidResult<()> {
        let config = config.ok_or(SidError::InvalidArgs)?;

        if let Err(e) = self.host.enable(config) {
            error!("Bluetooth init failed ({})", e);
            return Err(e.into());
        }
        self.host.register_events(self.events());

        if config.load_settings {
            if let Err(e) = self.host.load_settings() {
                error!("Settings load failed ({})", e);
                return Err(e.into());
            }
        }

        info!("BLE adapter initialized as {}", config.device_name);
        Ok(())
    }

    fn deinit(&mut self) -> SidResult<()> {
        self.host.unregister_events();
        if let Err(e) = self.host.disable() {
            warn!("Bluetooth disable failed ({})", e);
        }
        self.shared.set_connection(None);
        debug!("BLE adapter deinitialized");
        Ok(())
    }

    fn set_callback(&mut self, callbacks: Option<&BleCallbackSet>) -> SidResult<()> {
        let callbacks = callbacks.ok_or(SidError::NullPointer)?;
        let table = callbacks.to_table().ok_or(SidError::InvalidArgs)?;
        *write(&self.shared.callbacks) = Some(table);
        Ok(())
    }

    fn start_adv(&mut self) -> SidResult<()> {
        self.host.adv_start().map_err(|e| {
            error!("Advertising start failed ({})", e);
            SidError::from(e)
        })
    }

    fn stop_adv(&mut self) -> SidResult<()> {
        self.host.adv_stop().map_err(|e| {
            error!("Advertising stop failed ({})", e);
            SidError::from(e)
        })
    }

    fn set_adv_data(&mut self, data: Option<&[u8]>) -> SidResult<()> {
        let data = match data {
            Some(data) if !data.is_empty() => data,
            _ => return Err(SidError::InvalidArgs),
        };
        self.host.adv_update(data).map_err(|e| {
            error!("Advertising update failed ({})", e);
            SidError::from(e)
        })
    }

    fn start_service(&mut self) -> SidResult<()> {
        Ok(())
    }

    fn send(&mut self, service: ServiceId, data: Option<&[u8]>) -> SidResult<()> {
        if !service.is_deliverable() {
            return Err(SidError::NoSupport);
        }
        let data = match data {
            Some(data) if !data.is_empty() => data,
            _ => return Err(SidError::InvalidArgs),
        };

        let conn = self.shared.connection();
        let mtu = self.host.mtu(conn);
        if usize::from(mtu) < data.len() {
            debug!("Payload of {} bytes exceeds MTU {}", data.len(), mtu);
            return Err(SidError::InvalidArgs);
        }
        if !self.host.is_subscribed(conn, service) {
            debug!("Notifications not enabled on {}", service);
            return Err(SidError::InvalidArgs);
        }

        let attribute = service
            .notify_characteristic()
            .and_then(|uuid| self.host.find_characteristic(&uuid))
            .ok_or(SidError::NullPointer)?;

        self.host.notify(conn, attribute, data).map_err(|e| {
            error!("Notification on {} failed ({})", service, e);
            SidError::from(e)
        })
    }
}

// ----------------------------------------------------------------------------
// Host Notification Sink
// ----------------------------------------------------------------------------

/// Forwards host notifications to the registered application callbacks
struct AdapterEvents {
    shared: Arc<Shared>,
}

impl GattEvents for AdapterEvents {
    fn connected(&self, conn: ConnHandle, peer: PeerAddress, result: HostResult<()>) {
        if let Err(e) = result {
            error!("Connection to {} failed ({})", peer, e);
            return;
        }

        self.shared.set_connection(Some(conn));
        info!("BT Connected {}", peer);
        if let Some(callbacks) = self.shared.callbacks() {
            (callbacks.conn)(true, &peer);
        }
    }

    fn disconnected(&self, conn: ConnHandle, peer: PeerAddress, reason: u8) {
        {
            let mut active = write(&self.shared.connection);
            if *active == Some(conn) {
                *active = None;
            }
        }

        info!("BT Disconnected {} (reason {:#04x})", peer, reason);
        if let Some(callbacks) = self.shared.callbacks() {
            (callbacks.conn)(false, &peer);
        }
    }

    fn mtu_updated(&self, _conn: ConnHandle, mtu: u16) {
        debug!("MTU updated to {}", mtu);
        if let Some(callbacks) = self.shared.callbacks() {
            (callbacks.mtu)(mtu);
        }
    }

    fn ccc_changed(&self, service: ServiceId, enabled: bool) {
        debug!("Notifications on {} {}", service, if enabled { "enabled" } else { "disabled" });
        if let Some(callbacks) = self.shared.callbacks() {
            (callbacks.notify)(service, enabled);
        }
    }

    fn indication_confirmed(&self, success: bool) {
        if let Some(callbacks) = self.shared.callbacks() {
            (callbacks.ind)(success);
        }
    }

    fn advertising_started(&self) {
        if let Some(callbacks) = self.shared.callbacks() {
            (callbacks.adv_start)();
        }
    }

    fn receive_write(&self, service: ServiceId, data: &[u8]) -> usize {
        match self.shared.callbacks() {
            Some(callbacks) => (callbacks.data)(service, data),
            None => debug!("Dropping {} bytes written to {}, no callback set", data.len(), service),
        }
        data.len()
    }
}
