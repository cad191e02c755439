//! Application callback set
//!
//! The adapter forwards host notifications to six application callbacks.
//! A set is only accepted when every slot is filled; [`BleCallbackSet`] is
//! the caller-facing form with optional slots and [`CallbackTable`] is the
//! validated form the adapter actually invokes.

use std::sync::Arc;

use crate::protocol::{PeerAddress, ServiceId};

// ----------------------------------------------------------------------------
// Callback Types
// ----------------------------------------------------------------------------

/// Connection state changed: `(connected, peer address)`
pub type ConnCallback = Arc<dyn Fn(bool, &PeerAddress) + Send + Sync>;
/// Negotiated MTU changed
pub type MtuCallback = Arc<dyn Fn(u16) + Send + Sync>;
pub type AdvStartCallback = Arc<dyn Fn() + Send + Sync>;
/// Indication confirmed by the peer, with its status
pub type IndicationCallback = Arc<dyn Fn(bool) + Send + Sync>;
/// Inbound data; the slice is only valid for the duration of the call
pub type DataCallback = Arc<dyn Fn(ServiceId, &[u8]) + Send + Sync>;
/// Notifications enabled or disabled on a service
pub type NotifyCallback = Arc<dyn Fn(ServiceId, bool) + Send + Sync>;

// ----------------------------------------------------------------------------
// Callback Set
// ----------------------------------------------------------------------------

/// Callbacks registered through `set_callback`
#[derive(Clone, Default)]
pub struct BleCallbackSet {
    pub conn: Option<ConnCallback>,
    pub mtu: Option<MtuCallback>,
    pub adv_start: Option<AdvStartCallback>,
    pub ind: Option<IndicationCallback>,
    pub data: Option<DataCallback>,
    pub notify: Option<NotifyCallback>,
}

impl BleCallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conn(mut self, f: impl Fn(bool, &PeerAddress) + Send + Sync + 'static) -> Self {
        self.conn = Some(Arc::new(f));
        self
    }

    pub fn with_mtu(mut self, f: impl Fn(u16) + Send + Sync + 'static) -> Self {
        self.mtu = Some(Arc::new(f));
        self
    }

    pub fn with_adv_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.adv_start = Some(Arc::new(f));
        self
    }

    pub fn with_ind(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.ind = Some(Arc::new(f));
        self
    }

    pub fn with_data(mut self, f: impl Fn(ServiceId, &[u8]) + Send + Sync + 'static) -> Self {
        self.data = Some(Arc::new(f));
        self
    }

    pub fn with_notify(mut self, f: impl Fn(ServiceId, bool) + Send + Sync + 'static) -> Self {
        self.notify = Some(Arc::new(f));
        self
    }

    /// Number of populated slots
    pub fn populated(&self) -> usize {
        [
            self.conn.is_some(),
            self.mtu.is_some(),
            self.adv_start.is_some(),
            self.ind.is_some(),
            self.data.is_some(),
            self.notify.is_some(),
        ]
        .into_iter()
        .filter(|slot| *slot)
        .count()
    }

    pub fn is_complete(&self) -> bool {
        self.populated() == 6
    }

    /// Validated copy of the set, `None` if any slot is empty
    pub(crate) fn to_table(&self) -> Option<CallbackTable> {
        Some(CallbackTable {
            conn: self.conn.clone()?,
            mtu: self.mtu.clone()?,
            adv_start: self.adv_start.clone()?,
            ind: self.ind.clone()?,
            data: self.data.clone()?,
            notify: self.notify.clone()?,
        })
    }
}

impl core::fmt::Debug for BleCallbackSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BleCallbackSet")
            .field("populated", &self.populated())
            .finish()
    }
}

/// A complete callback set
#[derive(Clone)]
pub(crate) struct CallbackTable {
    pub(crate) conn: ConnCallback,
    pub(crate) mtu: MtuCallback,
    pub(crate) adv_start: AdvStartCallback,
    pub(crate) ind: IndicationCallback,
    pub(crate) data: DataCallback,
    pub(crate) notify: NotifyCallback,
}
