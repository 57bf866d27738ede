//! Command channel
//!
//! Handles the channel lifecycle and the write-frame / read-until-echo cycle.
//! One command is in flight at a time; the caller serialises access.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::{
    token, ChannelConfig, PortEnumerator, ProtocolError, ReconnectionManager, ResponsePolicy,
    SerialPortEnumerator, SerialTransport, Token, Transport, TransportSettings, TransportTarget,
    HEADER_TOKEN, LINE_ENDING, UNKNOWN_COMMAND_TOKEN,
};

/// Command sent by [`CommandChannel::ping`]
const PING_COMMAND: &str = "CMD";

/// Channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Not opened yet, or closed
    Closed,
    /// Open and ready for commands
    Open,
    /// A reconnect failed; the channel must be recreated
    Failed,
}

/// Channel over a real serial port
pub type SerialChannel = CommandChannel<SerialTransport, SerialPortEnumerator>;

/// Request/response channel to one device
pub struct CommandChannel<T: Transport, E: PortEnumerator> {
    transport: T,
    enumerator: E,
    target: TransportTarget,
    config: ChannelConfig,
    state: ChannelState,
}

impl SerialChannel {
    /// Create a channel that talks to `target` over a serial port
    pub fn serial(target: TransportTarget, config: ChannelConfig) -> Self {
        Self::new(target, SerialTransport::new(), SerialPortEnumerator, config)
    }
}

impl<T: Transport, E: PortEnumerator> CommandChannel<T, E> {
    /// Create a new channel (not yet opened)
    pub fn new(target: TransportTarget, transport: T, enumerator: E, config: ChannelConfig) -> Self {
        Self {
            transport,
            enumerator,
            target,
            config,
            state: ChannelState::Closed,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// The device this channel is bound to; its path follows reconnects
    pub fn target(&self) -> &TransportTarget {
        &self.target
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn settings(&self) -> TransportSettings {
        TransportSettings {
            baud_rate: self.config.baud_rate,
            timeout: self.config.read_timeout(),
        }
    }

    /// Open the transport. Opening an open channel does nothing.
    pub fn open(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            ChannelState::Open => Ok(()),
            ChannelState::Failed => Err(ProtocolError::ChannelFailed),
            ChannelState::Closed => {
                let settings = self.settings();
                self.transport.open(self.target.path(), &settings)?;
                self.state = ChannelState::Open;
                info!(path = self.target.path(), "channel opened");
                Ok(())
            }
        }
    }

    /// Close the transport. A failed channel stays failed.
    pub fn close(&mut self) {
        if self.state == ChannelState::Open {
            self.transport.close();
            self.state = ChannelState::Closed;
            debug!(path = self.target.path(), "channel closed");
        }
    }

    fn ensure_open(&self) -> Result<(), ProtocolError> {
        match self.state {
            ChannelState::Open => Ok(()),
            ChannelState::Closed => Err(ProtocolError::SerialConnectionNotFound),
            ChannelState::Failed => Err(ProtocolError::ChannelFailed),
        }
    }

    /// Execute a command and return the payload that follows its echo.
    ///
    /// Reconnects with the configured timeout if the device vanished.
    pub fn execute(&mut self, tokens: &[Token]) -> Result<Vec<String>, ProtocolError> {
        let timeout = self.config.reconnect_timeout();
        self.execute_with_timeout(tokens, timeout)
    }

    /// Execute a command, bounding any reconnect by `reconnect_timeout`.
    ///
    /// If the write finds the link lost, the channel reconnects and retries
    /// the command exactly once.
    pub fn execute_with_timeout(
        &mut self,
        tokens: &[Token],
        reconnect_timeout: Option<Duration>,
    ) -> Result<Vec<String>, ProtocolError> {
        self.ensure_open()?;
        let command = token::render(tokens);
        let echo: Vec<String> = tokens.iter().map(Token::to_string).collect();

        match self.write_command(&command) {
            Ok(()) => {}
            Err(ProtocolError::LinkLost(reason)) => {
                warn!(command = %command, reason = %reason, "link lost while writing, reconnecting");
                self.reconnect(reconnect_timeout)?;
                self.write_command(&command)?;
            }
            Err(e) => return Err(e),
        }

        self.read_response(&command, &echo)
    }

    /// Check the device is alive
    pub fn ping(&mut self, timeout: Option<Duration>) -> Result<(), ProtocolError> {
        self.execute_with_timeout(&[PING_COMMAND.into()], timeout)
            .map(|_| ())
    }

    /// Restart the device and wait for it to come back.
    ///
    /// The device must drop the link; an echoed `RST` is a [`ProtocolError::RestartFailure`].
    pub fn restart(&mut self, timeout: Option<Duration>) -> Result<(), ProtocolError> {
        self.restart_with(&["RST".into()], timeout)
    }

    /// Reset the device to factory settings and wait for it to come back
    pub fn factory_reset(&mut self, timeout: Option<Duration>) -> Result<(), ProtocolError> {
        self.restart_with(&["RST".into(), "FACTORY".into()], timeout)
    }

    /// Reboot into the bootloader and close the channel.
    ///
    /// The bootloader enumerates under a different product id, so no
    /// reconnect is attempted.
    pub fn enter_bootloader(&mut self) -> Result<(), ProtocolError> {
        self.ensure_open()?;
        match self.write_command("RST BOOTLOADER") {
            Ok(()) | Err(ProtocolError::LinkLost(_)) => {}
            Err(e) => return Err(e),
        }
        info!(path = self.target.path(), "device entering bootloader");
        self.close();
        Ok(())
    }

    fn restart_with(
        &mut self,
        tokens: &[Token],
        timeout: Option<Duration>,
    ) -> Result<(), ProtocolError> {
        self.ensure_open()?;
        let command = token::render(tokens);
        let echo: Vec<String> = tokens.iter().map(Token::to_string).collect();

        match self.write_command(&command) {
            Ok(()) => match self.read_response(&command, &echo) {
                Ok(_) => return Err(ProtocolError::RestartFailure),
                Err(ProtocolError::Timeout) | Err(ProtocolError::LinkLost(_)) => {}
                Err(e) => return Err(e),
            },
            Err(ProtocolError::LinkLost(_)) => {}
            Err(e) => return Err(e),
        }

        info!(command = %command, "device restarting");
        self.reconnect(timeout)
    }

    fn write_command(&mut self, command: &str) -> Result<(), ProtocolError> {
        debug!(command, "write");
        let frame = format!("{}{}", command, LINE_ENDING);
        self.transport.write(frame.as_bytes())
    }

    fn read_response(&mut self, command: &str, echo: &[String]) -> Result<Vec<String>, ProtocolError> {
        let mut lines_read = 0usize;

        loop {
            let raw = self.transport.read_line()?;
            if raw.is_empty() {
                debug!(command, "no response before read timeout");
                return Err(ProtocolError::Timeout);
            }
            lines_read += 1;

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            trace!(line, "read");

            let mut tokens: Vec<&str> = line.split(' ').collect();
            if self.config.serial_header && tokens.first() == Some(&HEADER_TOKEN) {
                tokens.remove(0);
            }

            if tokens.first() == Some(&UNKNOWN_COMMAND_TOKEN) {
                return Err(ProtocolError::UnknownCommand(command.to_string()));
            }

            if echoes(&tokens, echo) {
                return Ok(tokens[echo.len()..].iter().map(|t| t.to_string()).collect());
            }

            let desync = match self.config.response_policy {
                ResponsePolicy::FailFast => true,
                ResponsePolicy::SkipUnrelated { max_lines } => {
                    max_lines.is_some_and(|max| lines_read >= max)
                }
            };
            if desync {
                return Err(ProtocolError::InvalidResponse {
                    command: command.to_string(),
                    response: line.to_string(),
                });
            }
            debug!(line, "skipping unrelated line");
        }
    }

    fn reconnect(&mut self, timeout: Option<Duration>) -> Result<(), ProtocolError> {
        let settings = self.settings();
        let poll_interval = self.config.poll_interval();
        let mut manager = ReconnectionManager::new(self.target.clone(), timeout, poll_interval);

        match manager.run(&mut self.enumerator, &mut self.transport, &settings) {
            Ok(path) => {
                self.target.set_path(path);
                self.state = ChannelState::Open;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "reconnect failed, channel is no longer usable");
                self.transport.close();
                self.state = ChannelState::Failed;
                Err(e)
            }
        }
    }
}

fn echoes(tokens: &[&str], echo: &[String]) -> bool {
    tokens.len() >= echo.len() && tokens.iter().zip(echo).all(|(got, want)| *got == want.as_str())
}

impl<T: Transport, E: PortEnumerator> Drop for CommandChannel<T, E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echoes() {
        let echo = vec!["CML".to_string(), "C0".to_string()];
        assert!(echoes(&["CML", "C0", "42"], &echo));
        assert!(echoes(&["CML", "C0"], &echo));
        assert!(!echoes(&["CML"], &echo));
        assert!(!echoes(&["CML", "C1", "42"], &echo));
        assert!(!echoes(&["cml", "C0", "42"], &echo));
        assert!(echoes(&["anything"], &[]));
    }

    #[test]
    fn test_serial_channel_starts_closed() {
        let channel = CommandChannel::serial(
            TransportTarget::new(0x303A, 0x812E, "/dev/ttyACM0"),
            ChannelConfig::default(),
        );
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(!channel.is_open());
        assert_eq!(channel.target().path(), "/dev/ttyACM0");
    }

    #[test]
    fn test_execute_before_open() {
        let mut channel = CommandChannel::serial(
            TransportTarget::new(0x303A, 0x812E, "/dev/ttyACM0"),
            ChannelConfig::default(),
        );
        assert!(matches!(
            channel.execute(&["ID".into()]),
            Err(ProtocolError::SerialConnectionNotFound)
        ));
    }
}
