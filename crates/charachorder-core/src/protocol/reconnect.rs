//! Auto-reconnect
//!
//! When the device reboots its serial node disappears and comes back, usually
//! under a different path. [`ReconnectionManager`] polls the port enumerator
//! until exactly one port with the channel's vendor/product id shows up at a
//! new path, then re-opens the transport there.
//!
//! States: `Searching -> Opening -> Connected`, with `Failed` absorbing.
//! Two or more matching ports are a permanent failure: vendor and product id
//! alone cannot tell which unit was ours.

use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::{PortEnumerator, PortInfo, ProtocolError, Transport, TransportSettings, TransportTarget};

/// Reconnect state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectState {
    /// Polling the enumerator for the device
    Searching,
    /// A candidate port was found and is being opened
    Opening(String),
    /// The transport is open at the new path
    Connected(String),
    /// Timed out or found too many devices
    Failed,
}

/// What one enumeration says about the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortScan {
    /// No port with our ids is visible
    NotVisible,
    /// The only match is still the old path: the device has not dropped off yet
    SamePath,
    /// Exactly one match at a new path
    Candidate(String),
    /// Several matching ports
    Ambiguous(usize),
}

/// Classify the visible ports against the target the channel was bound to
pub fn classify(target: &TransportTarget, ports: &[PortInfo]) -> PortScan {
    let matches: Vec<&PortInfo> = ports.iter().filter(|p| target.same_identity(p)).collect();
    match matches.as_slice() {
        [] => PortScan::NotVisible,
        [port] if port.name == target.path() => PortScan::SamePath,
        [port] => PortScan::Candidate(port.name.clone()),
        many => PortScan::Ambiguous(many.len()),
    }
}

/// Runs one reconnect attempt. Discard it once `run` returns.
#[derive(Debug)]
pub struct ReconnectionManager {
    target: TransportTarget,
    timeout: Option<Duration>,
    poll_interval: Duration,
    state: ReconnectState,
    polls: usize,
}

impl ReconnectionManager {
    /// `timeout` of None polls until the device shows up
    pub fn new(target: TransportTarget, timeout: Option<Duration>, poll_interval: Duration) -> Self {
        Self {
            target,
            timeout,
            poll_interval,
            state: ReconnectState::Searching,
            polls: 0,
        }
    }

    pub fn state(&self) -> &ReconnectState {
        &self.state
    }

    /// Number of enumerations performed so far
    pub fn polls(&self) -> usize {
        self.polls
    }

    /// Drive the state machine to `Connected` or `Failed`.
    ///
    /// Returns the path the transport is now open at.
    pub fn run<T, E>(
        &mut self,
        enumerator: &mut E,
        transport: &mut T,
        settings: &TransportSettings,
    ) -> Result<String, ProtocolError>
    where
        T: Transport + ?Sized,
        E: PortEnumerator + ?Sized,
    {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        self.state = ReconnectState::Searching;
        info!(
            vid = self.target.vendor_id(),
            pid = self.target.product_id(),
            old_path = self.target.path(),
            timeout = ?self.timeout,
            "waiting for device to reappear"
        );

        loop {
            match self.state.clone() {
                ReconnectState::Searching => self.search(enumerator, deadline)?,
                ReconnectState::Opening(path) => {
                    if !self.open(transport, settings, path) {
                        self.wait(deadline)?;
                    }
                }
                ReconnectState::Connected(path) => {
                    info!(path = %path, polls = self.polls, "reconnected");
                    return Ok(path);
                }
                ReconnectState::Failed => return Err(ProtocolError::ChannelFailed),
            }
        }
    }

    fn search<E>(&mut self, enumerator: &mut E, deadline: Option<Instant>) -> Result<(), ProtocolError>
    where
        E: PortEnumerator + ?Sized,
    {
        self.polls += 1;
        let ports = match enumerator.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                debug!(error = %e, "port enumeration failed, retrying");
                Vec::new()
            }
        };

        match classify(&self.target, &ports) {
            PortScan::Candidate(path) => {
                debug!(path = %path, "candidate port found");
                self.state = ReconnectState::Opening(path);
                return Ok(());
            }
            PortScan::Ambiguous(count) => {
                warn!(count, "several matching devices visible, giving up");
                self.state = ReconnectState::Failed;
                return Err(ProtocolError::TooManyDevices {
                    vendor_id: self.target.vendor_id(),
                    product_id: self.target.product_id(),
                    count,
                });
            }
            PortScan::SamePath => trace!("device still at its old path"),
            PortScan::NotVisible => trace!("device not visible"),
        }

        self.wait(deadline)
    }

    /// Fail once the deadline has passed, otherwise pause before the next poll
    fn wait(&mut self, deadline: Option<Instant>) -> Result<(), ProtocolError> {
        let mut pause = self.poll_interval;
        if let (Some(deadline), Some(timeout)) = (deadline, self.timeout) {
            let now = Instant::now();
            if now >= deadline {
                warn!(?timeout, polls = self.polls, "device did not reappear");
                self.state = ReconnectState::Failed;
                return Err(ProtocolError::ReconnectTimeout(timeout));
            }
            pause = pause.min(deadline - now);
        }
        thread::sleep(pause);
        Ok(())
    }

    /// Returns false if the open was refused and the search goes on
    fn open<T>(&mut self, transport: &mut T, settings: &TransportSettings, path: String) -> bool
    where
        T: Transport + ?Sized,
    {
        transport.close();
        match transport.open(&path, settings) {
            Ok(()) => {
                self.state = ReconnectState::Connected(path);
                true
            }
            Err(e) => {
                // The node can show up before it accepts connections.
                debug!(path = %path, error = %e, "open failed, searching again");
                self.state = ReconnectState::Searching;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const VID: u16 = 0x303A;
    const PID: u16 = 0x812E;

    struct ScriptedPorts {
        rounds: VecDeque<Result<Vec<PortInfo>, ProtocolError>>,
    }

    impl PortEnumerator for ScriptedPorts {
        fn list_ports(&mut self) -> Result<Vec<PortInfo>, ProtocolError> {
            match self.rounds.len() {
                0 => Ok(Vec::new()),
                1 => match self.rounds.front() {
                    Some(Ok(ports)) => Ok(ports.clone()),
                    _ => Ok(Vec::new()),
                },
                _ => self.rounds.pop_front().unwrap_or(Ok(Vec::new())),
            }
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        open_at: Option<String>,
        refuse_opens: usize,
        closes: usize,
    }

    impl Transport for FakeTransport {
        fn open(&mut self, path: &str, _: &TransportSettings) -> Result<(), ProtocolError> {
            if self.refuse_opens > 0 {
                self.refuse_opens -= 1;
                return Err(ProtocolError::SerialError("busy".into()));
            }
            self.open_at = Some(path.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.closes += 1;
            self.open_at = None;
        }

        fn is_open(&self) -> bool {
            self.open_at.is_some()
        }

        fn write(&mut self, _: &[u8]) -> Result<(), ProtocolError> {
            Ok(())
        }

        fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError> {
            Ok(Vec::new())
        }
    }

    fn settings() -> TransportSettings {
        TransportSettings {
            baud_rate: 115200,
            timeout: Duration::from_millis(10),
        }
    }

    fn target() -> TransportTarget {
        TransportTarget::new(VID, PID, "/dev/ttyACM0")
    }

    fn manager(timeout_ms: u64) -> ReconnectionManager {
        ReconnectionManager::new(target(), Some(Duration::from_millis(timeout_ms)), Duration::from_millis(1))
    }

    #[test]
    fn test_classify() {
        let other = PortInfo::usb("/dev/ttyUSB0", 0x1234, 0x5678);
        assert_eq!(classify(&target(), &[]), PortScan::NotVisible);
        assert_eq!(classify(&target(), &[other.clone()]), PortScan::NotVisible);
        assert_eq!(
            classify(&target(), &[PortInfo::usb("/dev/ttyACM0", VID, PID)]),
            PortScan::SamePath
        );
        assert_eq!(
            classify(&target(), &[other, PortInfo::usb("/dev/ttyACM1", VID, PID)]),
            PortScan::Candidate("/dev/ttyACM1".into())
        );
        assert_eq!(
            classify(
                &target(),
                &[
                    PortInfo::usb("/dev/ttyACM0", VID, PID),
                    PortInfo::usb("/dev/ttyACM1", VID, PID),
                ]
            ),
            PortScan::Ambiguous(2)
        );
    }

    #[test]
    fn test_same_path_then_new_path() {
        let mut ports = ScriptedPorts {
            rounds: VecDeque::from(vec![
                Ok(vec![PortInfo::usb("/dev/ttyACM0", VID, PID)]),
                Ok(vec![]),
                Ok(vec![PortInfo::usb("/dev/ttyACM1", VID, PID)]),
            ]),
        };
        let mut transport = FakeTransport::default();
        let mut mgr = manager(1000);

        let path = mgr.run(&mut ports, &mut transport, &settings()).unwrap();
        assert_eq!(path, "/dev/ttyACM1");
        assert_eq!(transport.open_at.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(mgr.state(), &ReconnectState::Connected("/dev/ttyACM1".into()));
        assert_eq!(mgr.polls(), 3);
    }

    #[test]
    fn test_enumeration_errors_are_retried() {
        let mut ports = ScriptedPorts {
            rounds: VecDeque::from(vec![
                Err(ProtocolError::SerialError("udev busy".into())),
                Ok(vec![PortInfo::usb("/dev/ttyACM2", VID, PID)]),
            ]),
        };
        let mut transport = FakeTransport::default();
        let path = manager(1000).run(&mut ports, &mut transport, &settings()).unwrap();
        assert_eq!(path, "/dev/ttyACM2");
    }

    #[test]
    fn test_open_failure_returns_to_searching() {
        let mut ports = ScriptedPorts {
            rounds: VecDeque::from(vec![Ok(vec![PortInfo::usb("/dev/ttyACM1", VID, PID)])]),
        };
        let mut transport = FakeTransport {
            refuse_opens: 2,
            ..Default::default()
        };
        let mut mgr = manager(1000);
        let path = mgr.run(&mut ports, &mut transport, &settings()).unwrap();
        assert_eq!(path, "/dev/ttyACM1");
        assert_eq!(mgr.polls(), 3);
        assert_eq!(transport.closes, 3);
    }

    #[test]
    fn test_refused_opens_respect_deadline() {
        let mut ports = ScriptedPorts {
            rounds: VecDeque::from(vec![Ok(vec![PortInfo::usb("/dev/ttyACM1", VID, PID)])]),
        };
        let mut transport = FakeTransport {
            refuse_opens: usize::MAX,
            ..Default::default()
        };
        let mut mgr = manager(20);
        let err = mgr.run(&mut ports, &mut transport, &settings()).unwrap_err();
        assert!(matches!(err, ProtocolError::ReconnectTimeout(_)));
        assert_eq!(mgr.state(), &ReconnectState::Failed);
        // one pause per refused open, not a spin
        assert!(mgr.polls() <= 30, "polled {} times", mgr.polls());
    }

    #[test]
    fn test_timeout() {
        let mut ports = ScriptedPorts {
            rounds: VecDeque::new(),
        };
        let mut transport = FakeTransport::default();
        let mut mgr = manager(20);
        let err = mgr.run(&mut ports, &mut transport, &settings()).unwrap_err();
        assert!(matches!(err, ProtocolError::ReconnectTimeout(t) if t == Duration::from_millis(20)));
        assert_eq!(mgr.state(), &ReconnectState::Failed);
        assert!(transport.open_at.is_none());
    }

    #[test]
    fn test_too_many_devices() {
        let mut ports = ScriptedPorts {
            rounds: VecDeque::from(vec![Ok(vec![
                PortInfo::usb("/dev/ttyACM1", VID, PID),
                PortInfo::usb("/dev/ttyACM2", VID, PID),
            ])]),
        };
        let mut transport = FakeTransport::default();
        let mut mgr = manager(1000);
        let err = mgr.run(&mut ports, &mut transport, &settings()).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TooManyDevices { count: 2, vendor_id: VID, product_id: PID }
        ));
        assert_eq!(mgr.state(), &ReconnectState::Failed);
    }
}
