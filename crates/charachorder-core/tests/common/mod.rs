//! In-memory transport and port enumerator shared by the integration tests

#![allow(dead_code)]

use charachorder_core::protocol::{
    ChannelConfig, CommandChannel, PortEnumerator, PortInfo, ProtocolError, Transport,
    TransportSettings, TransportTarget,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

pub const VID: u16 = 0x303A;
pub const PID: u16 = 0x812E;
pub const PATH: &str = "/dev/ttyACM0";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock serial device state
#[derive(Debug, Default)]
pub struct MockSerial {
    /// Frames written, decoded as UTF-8
    pub written: Vec<String>,
    /// Lines handed out by `read_line`; an exhausted queue reads as a timeout
    pub lines: VecDeque<Vec<u8>>,
    pub open_path: Option<String>,
    pub opened: Vec<String>,
    pub closes: usize,
    /// Number of upcoming writes that fail as if the device vanished
    pub lost_writes: usize,
    /// Number of upcoming opens that fail
    pub refused_opens: usize,
    /// Reads fail as if the device vanished
    pub lost_reads: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport(Arc<Mutex<MockSerial>>);

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockSerial> {
        self.0.lock().unwrap()
    }

    pub fn push_line(&self, line: &str) {
        self.state()
            .lines
            .push_back(format!("{}\r\n", line).into_bytes());
    }
}

impl Transport for MockTransport {
    fn open(&mut self, path: &str, _settings: &TransportSettings) -> Result<(), ProtocolError> {
        let mut state = self.state();
        if state.refused_opens > 0 {
            state.refused_opens -= 1;
            return Err(ProtocolError::SerialError("Device or resource busy".into()));
        }
        state.open_path = Some(path.to_string());
        state.opened.push(path.to_string());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.open_path = None;
        state.closes += 1;
    }

    fn is_open(&self) -> bool {
        self.state().open_path.is_some()
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        let mut state = self.state();
        if state.open_path.is_none() {
            return Err(ProtocolError::SerialConnectionNotFound);
        }
        if state.lost_writes > 0 {
            state.lost_writes -= 1;
            return Err(ProtocolError::LinkLost("No such device".into()));
        }
        state.written.push(String::from_utf8_lossy(frame).into_owned());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut state = self.state();
        if state.lost_reads {
            return Err(ProtocolError::LinkLost("No such device".into()));
        }
        Ok(state.lines.pop_front().unwrap_or_default())
    }
}

/// Scripted port lists. The last round repeats once the script runs out.
#[derive(Debug, Default)]
pub struct PortScript {
    pub rounds: VecDeque<Option<Vec<PortInfo>>>,
    pub calls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockEnumerator(Arc<Mutex<PortScript>>);

impl MockEnumerator {
    /// `None` rounds fail the enumeration
    pub fn with_rounds(rounds: Vec<Option<Vec<PortInfo>>>) -> Self {
        Self(Arc::new(Mutex::new(PortScript {
            rounds: rounds.into(),
            calls: 0,
        })))
    }

    pub fn calls(&self) -> usize {
        self.0.lock().unwrap().calls
    }
}

impl PortEnumerator for MockEnumerator {
    fn list_ports(&mut self) -> Result<Vec<PortInfo>, ProtocolError> {
        let mut script = self.0.lock().unwrap();
        script.calls += 1;
        let round = if script.rounds.len() > 1 {
            script.rounds.pop_front().flatten()
        } else {
            script.rounds.front().cloned().flatten()
        };
        match round {
            Some(ports) => Ok(ports),
            None if script.rounds.is_empty() => Ok(Vec::new()),
            None => Err(ProtocolError::SerialError("enumeration failed".into())),
        }
    }
}

pub fn device_at(path: &str) -> PortInfo {
    PortInfo::usb(path, VID, PID)
}

pub fn fast_config() -> ChannelConfig {
    ChannelConfig {
        read_timeout_ms: 10,
        reconnect_timeout_ms: Some(200),
        reconnect_poll_interval_ms: 1,
        ..ChannelConfig::default()
    }
}

pub type MockChannel = CommandChannel<MockTransport, MockEnumerator>;

/// An open channel on `PATH` plus handles to its mocks
pub fn open_channel(
    config: ChannelConfig,
    ports: MockEnumerator,
) -> (MockChannel, MockTransport, MockEnumerator) {
    init_tracing();
    let transport = MockTransport::new();
    let mut channel = CommandChannel::new(
        TransportTarget::new(VID, PID, PATH),
        transport.clone(),
        ports.clone(),
        config,
    );
    channel.open().unwrap();
    (channel, transport, ports)
}
