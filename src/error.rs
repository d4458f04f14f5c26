//! Error types for gated PLC access.

use std::io;
use thiserror::Error;

/// Result type alias for gated PLC operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors that can occur while talking to the PLC through the gate.
///
/// Unsupported value types are not errors: decoding helpers return `None`
/// for them. Clock anomalies inside the gate are logged and never surface
/// here.
#[derive(Debug, Error)]
pub enum GateError {
    /// The device connection failed (disconnect, malformed response, refused request).
    #[error("Transport error: {reason}")]
    Transport {
        /// Description reported by the device connection.
        reason: String,
    },

    /// The device connection did not answer in time.
    #[error("Communication timeout")]
    Timeout,

    /// An operation was attempted while the connection is closed.
    #[error("Not connected to PLC")]
    NotConnected,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid PLC address.
    #[error("Invalid address: {reason}")]
    InvalidAddress {
        /// Description of the addressing error.
        reason: String,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// A value cannot be represented in its S7 encoding.
    #[error("Cannot encode value: {reason}")]
    Encode {
        /// Description of the encoding problem.
        reason: String,
    },

    /// The caller-configured wait for the gate expired.
    #[error("Gate not acquired within {waited_ms} ms")]
    GateTimeout {
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },
}

impl GateError {
    /// Creates a new `Transport` error.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_gate::GateError;
    ///
    /// let err = GateError::transport("connection reset by peer");
    /// assert!(err.is_transport());
    /// ```
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidAddress` error.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_gate::GateError;
    ///
    /// let err = GateError::invalid_address("bit index 9 is out of range 0-7");
    /// ```
    pub fn invalid_address(reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_gate::GateError;
    ///
    /// let err = GateError::invalid_parameter("count", "must be greater than 0");
    /// ```
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `Encode` error.
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
        }
    }

    /// Returns whether the error originated in the device connection itself.
    ///
    /// These are the failures the retry loop exists for.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout | Self::NotConnected | Self::Io(_)
        )
    }
}
