//! Serial port handling
//!
//! `serialport` backed implementations of [`Transport`] and [`PortEnumerator`].

use serialport::{ClearBuffer, SerialPort, SerialPortInfo, SerialPortType};
use std::io::{self, Read, Write};
use tracing::{debug, trace, warn};

use super::transport::is_link_lost;
use super::{PortEnumerator, ProtocolError, Transport, TransportSettings};

/// One port as reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Path or name used to open the port, e.g. `/dev/ttyACM0` or `COM3`
    pub name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    /// USB serial number; CharaChorder firmware does not always report one
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// A USB port with the given ids and no descriptive strings
    pub fn usb(name: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            name: name.into(),
            vid: Some(vid),
            pid: Some(pid),
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product, serial_number) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
                usb_info.serial_number,
            ),
            _ => (None, None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
            serial_number,
        }
    }
}

/// Order ports by name stem, then by their trailing number, so that
/// `ttyACM2` sorts before `ttyACM10` and `COM3` before `COM12`.
fn port_order(name: &str) -> (String, u32, String) {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = base[stem.len()..].parse().unwrap_or(0);
    (stem.to_string(), number, base.to_string())
}

/// List all available serial ports in a deterministic order
pub fn list_ports() -> Result<Vec<PortInfo>, ProtocolError> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by_key(|p| port_order(&p.name));
    Ok(ports)
}

/// Enumerates ports through the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortEnumerator;

impl PortEnumerator for SerialPortEnumerator {
    fn list_ports(&mut self) -> Result<Vec<PortInfo>, ProtocolError> {
        list_ports()
    }
}

fn map_serial_error(err: serialport::Error) -> ProtocolError {
    match err.kind() {
        serialport::ErrorKind::NoDevice => ProtocolError::LinkLost(err.to_string()),
        serialport::ErrorKind::Io(kind) if is_link_lost(&io::Error::from(kind)) => {
            ProtocolError::LinkLost(err.to_string())
        }
        _ => ProtocolError::SerialError(err.to_string()),
    }
}

fn map_io_error(err: io::Error) -> ProtocolError {
    if is_link_lost(&err) {
        ProtocolError::LinkLost(err.to_string())
    } else {
        ProtocolError::IoError(err)
    }
}

/// A USB-serial port opened 8N1 without flow control
#[derive(Default)]
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    /// Bytes read past the last returned line
    pending: Vec<u8>,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, path: &str, settings: &TransportSettings) -> Result<(), ProtocolError> {
        self.close();

        let mut port = serialport::new(path, settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(settings.timeout)
            .open()
            .map_err(map_serial_error)?;

        if let Err(e) = port.clear(ClearBuffer::All) {
            warn!(path, error = %e, "failed to clear serial buffers (continuing)");
        }

        debug!(path, baud = settings.baud_rate, "serial port opened");
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(port) = self.port.take() {
            debug!(path = ?port.name(), "serial port closed");
        }
        self.pending.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        let port = self
            .port
            .as_mut()
            .ok_or(ProtocolError::SerialConnectionNotFound)?;
        port.write_all(frame).map_err(map_io_error)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let port = self
            .port
            .as_mut()
            .ok_or(ProtocolError::SerialConnectionNotFound)?;

        let mut buffer = [0u8; 256];
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                return Ok(self.pending.drain(..=end).collect());
            }

            match port.read(&mut buffer) {
                Ok(0) => return Ok(std::mem::take(&mut self.pending)),
                Ok(n) => {
                    trace!(bytes = n, "serial read");
                    self.pending.extend_from_slice(&buffer[..n]);
                }
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Ok(std::mem::take(&mut self.pending));
                }
                Err(e) => return Err(map_io_error(e)),
            }
        }
    }
}
