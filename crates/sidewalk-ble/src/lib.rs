//! BLE transport adapter for a Sidewalk end device
//!
//! The adapter sits between the protocol stack and a short-range radio host.
//! It owns no radio code itself: every radio operation goes through the
//! [`BleHost`] trait, and host notifications come back through
//! [`GattEvents`].
//!
//! ## Architecture
//!
//! - [`config`] - Adapter configuration consumed by `init`
//! - [`error`] - Host status codes and their mapping into [`SidError`](sidewalk_core::SidError)
//! - [`protocol`] - Service identifiers, characteristic UUIDs, peer addresses
//! - [`callbacks`] - The six-slot application callback set
//! - [`host`] - The radio host capability and its notification sink
//! - [`adapter`] - The adapter itself, with the admission checks on `send`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sidewalk_ble::{create, BleAdapterInterface, BleCallbackSet, BleConfig};
//!
//! let mut slot = None;
//! create(host, Some(&mut slot))?;
//! let adapter = slot.as_mut().unwrap();
//! adapter.init(Some(&BleConfig::default()))?;
//! adapter.set_callback(Some(&callbacks))?;
//! adapter.start_adv()?;
//! ```

pub mod adapter;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod host;
pub mod protocol;

// Public API exports
pub use adapter::{create, BleAdapter, BleAdapterInterface};
pub use callbacks::{
    AdvStartCallback, BleCallbackSet, ConnCallback, DataCallback, IndicationCallback,
    MtuCallback, NotifyCallback,
};
pub use config::BleConfig;
pub use error::{HostError, HostResult};
pub use host::{AttributeHandle, BleHost, ConnHandle, GattEvents};
pub use protocol::{
    PeerAddress, ServiceId, AMA_NOTIFY_CHARACTERISTIC_UUID, AMA_SERVICE_UUID,
    AMA_WRITE_CHARACTERISTIC_UUID,
};
