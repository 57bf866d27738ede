//! Channel configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use super::{DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};

/// What to do with a response line that does not echo the command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePolicy {
    /// Treat unmatched lines as asynchronous log output and keep reading.
    /// `max_lines` bounds how many lines are read in total (None = no bound).
    SkipUnrelated { max_lines: Option<usize> },
    /// The first unmatched line is a framing desync
    FailFast,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        ResponsePolicy::SkipUnrelated { max_lines: None }
    }
}

/// Command channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// How long a single line read may block, in milliseconds
    pub read_timeout_ms: u64,
    /// Handling of response lines that do not echo the command
    pub response_policy: ResponsePolicy,
    /// Reconnect deadline in milliseconds (None = wait forever)
    pub reconnect_timeout_ms: Option<u64>,
    /// Delay between port enumerations while reconnecting
    pub reconnect_poll_interval_ms: u64,
    /// Strip the "01" header token when present
    pub serial_header: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            response_policy: ResponsePolicy::default(),
            reconnect_timeout_ms: None,
            reconnect_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            serial_header: true,
        }
    }
}

impl ChannelConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(content: &str) -> io::Result<Self> {
        serde_json::from_str(content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Load a configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_timeout(&self) -> Option<Duration> {
        self.reconnect_timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_poll_interval_ms)
    }
}
