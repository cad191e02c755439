//! BLE service identifiers and GATT constants

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// GATT UUIDs
// ----------------------------------------------------------------------------

/// Sidewalk (AMA) GATT service
pub const AMA_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000FE03_0000_1000_8000_00805F9B34FB);

/// Characteristic written by the peer (inbound data)
pub const AMA_WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x74BA0001_0D2D_4AB0_8C65_8EA4DE71D0A4);

/// Characteristic notified to the peer (outbound data)
pub const AMA_NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x74BA0003_0D2D_4AB0_8C65_8EA4DE71D0A4);

// ----------------------------------------------------------------------------
// Service Identifiers
// ----------------------------------------------------------------------------

/// Service a BLE payload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceId {
    Ama,
    Vendor,
    Logging,
    /// Any identifier the adapter does not know about
    Other(u8),
}

impl ServiceId {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ServiceId::Ama,
            1 => ServiceId::Vendor,
            2 => ServiceId::Logging,
            other => ServiceId::Other(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            ServiceId::Ama => 0,
            ServiceId::Vendor => 1,
            ServiceId::Logging => 2,
            ServiceId::Other(raw) => raw,
        }
    }

    /// Only the AMA service carries outbound traffic
    pub fn is_deliverable(self) -> bool {
        self == ServiceId::Ama
    }

    /// Characteristic used to notify data for this service
    pub fn notify_characteristic(self) -> Option<Uuid> {
        match self {
            ServiceId::Ama => Some(AMA_NOTIFY_CHARACTERISTIC_UUID),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceId::Ama => f.write_str("AMA"),
            ServiceId::Vendor => f.write_str("vendor"),
            ServiceId::Logging => f.write_str("logging"),
            ServiceId::Other(raw) => write!(f, "service {}", raw),
        }
    }
}

// ----------------------------------------------------------------------------
// Peer Address
// ----------------------------------------------------------------------------

/// Six-byte BLE device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PeerAddress(pub [u8; 6]);

impl PeerAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        PeerAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}
