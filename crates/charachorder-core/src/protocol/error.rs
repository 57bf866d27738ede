//! Protocol errors

use std::time::Duration;

use thiserror::Error;

use crate::codec::CodecError;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),

    #[error("Invalid response to '{command}': '{response}'")]
    InvalidResponse { command: String, response: String },

    #[error("Serial connection not found: the channel is not open")]
    SerialConnectionNotFound,

    #[error("Device did not reappear within {0:?}")]
    ReconnectTimeout(Duration),

    #[error("Found {count} devices matching {vendor_id:#06x}:{product_id:#06x}, cannot tell which one to reconnect to")]
    TooManyDevices {
        vendor_id: u16,
        product_id: u16,
        count: usize,
    },

    #[error("Device answered the restart command instead of restarting")]
    RestartFailure,

    #[error("Channel failed permanently after a lost connection and must be recreated")]
    ChannelFailed,

    #[error("Serial link lost: {0}")]
    LinkLost(String),

    #[error("No response from device")]
    Timeout,

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("{what} index {index} out of range (0..{len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error leaves the owning channel permanently unusable
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProtocolError::ReconnectTimeout(_)
                | ProtocolError::TooManyDevices { .. }
                | ProtocolError::ChannelFailed
        )
    }
}
