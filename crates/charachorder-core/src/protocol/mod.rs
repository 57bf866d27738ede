//! Serial Protocol Communication
//!
//! Implements the line-oriented CharaChorder serial API: commands are written
//! as space-separated tokens ending in CRLF, and the device answers with a
//! line that echoes the command followed by the payload.
//!
//! The [`CommandChannel`] follows the device across reboots by re-locating it
//! among freshly enumerated ports (see [`ReconnectionManager`]).

mod channel;
pub mod commands;
mod config;
mod error;
pub mod reconnect;
pub mod serial;
pub mod token;
mod transport;

pub use channel::{ChannelState, CommandChannel, SerialChannel};
pub use commands::{KeymapCode, ParameterCode};
pub use config::{ChannelConfig, ResponsePolicy};
pub use error::ProtocolError;
pub use reconnect::{ReconnectState, ReconnectionManager};
pub use serial::{list_ports, PortInfo, SerialPortEnumerator, SerialTransport};
pub use token::Token;
pub use transport::{PortEnumerator, Transport, TransportSettings, TransportTarget};

/// Default baud rate for the device
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default timeout for a single line read in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default delay between port scans while reconnecting
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Leading token on every response line when serial-header mode is on
pub const HEADER_TOKEN: &str = "01";

/// First token of the device's reply to a command it does not recognise
pub const UNKNOWN_COMMAND_TOKEN: &str = "UKN";

/// Frame terminator for requests
pub const LINE_ENDING: &str = "\r\n";
