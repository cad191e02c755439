//! Error types for the Sidewalk end-device runtime
//!
//! A single taxonomy is shared by the event dispatcher, the pending-message
//! registry and the BLE transport adapter, so every layer reports failures
//! with the same vocabulary.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Core error type for the end-device runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidError {
    /// Malformed caller input: missing payload, zero length, partial callback set
    #[error("Invalid arguments")]
    InvalidArgs,

    /// A required reference was absent, or could not be resolved
    #[error("Null pointer")]
    NullPointer,

    /// Well-formed request that the current configuration cannot satisfy
    #[error("Not supported")]
    NoSupport,

    /// Lookup failure, e.g. an unknown message identifier
    #[error("Not found")]
    NotFound,

    /// Allocation failure while duplicating a payload
    #[error("Out of resources")]
    OutOfResources,

    /// A lock could not be taken without blocking
    #[error("Resource busy")]
    Busy,

    /// Opaque failure surfaced from an external collaborator
    #[error("Generic error: {reason}")]
    Generic { reason: String },

    /// Raw status code returned by the protocol stack
    #[error("Stack error code {code}")]
    Stack { code: i32 },

    /// Event channel failure
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl SidError {
    /// Create a generic error with a reason
    pub fn generic<T: Into<String>>(reason: T) -> Self {
        SidError::Generic {
            reason: reason.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        SidError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        SidError::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether the error is the soft failure reported on lock contention
    pub fn is_busy(&self) -> bool {
        matches!(self, SidError::Busy)
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type SidResult<T> = core::result::Result<T, SidError>;
