//! Error types for the BLE host

use sidewalk_core::SidError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Failure reported by the radio host, as a negative errno-style status
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("BLE host error {errno}")]
pub struct HostError {
    pub errno: i32,
}

impl HostError {
    pub const fn new(errno: i32) -> Self {
        Self { errno }
    }
}

pub type HostResult<T> = core::result::Result<T, HostError>;

/// Host failures surface to the stack as opaque generic errors
impl From<HostError> for SidError {
    fn from(err: HostError) -> Self {
        SidError::generic(err.to_string())
    }
}
