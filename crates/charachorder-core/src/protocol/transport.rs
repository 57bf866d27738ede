//! Transport abstraction
//!
//! The channel talks to the device through a [`Transport`] and finds it again
//! after a reboot through a [`PortEnumerator`]. Production code uses the
//! `serialport` backed implementations in [`super::serial`].

use std::io;
use std::time::Duration;

use super::{PortInfo, ProtocolError};

/// Settings applied when a transport is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    pub baud_rate: u32,
    /// Upper bound on how long one `read_line` call blocks
    pub timeout: Duration,
}

/// A byte stream to the device
pub trait Transport {
    /// Open the transport at `path`
    fn open(&mut self, path: &str, settings: &TransportSettings) -> Result<(), ProtocolError>;

    /// Close the transport. Closing a closed transport does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Write one frame. A vanished device is reported as [`ProtocolError::LinkLost`].
    fn write(&mut self, frame: &[u8]) -> Result<(), ProtocolError>;

    /// Read up to and including the next `\n`. Returns an empty buffer if
    /// nothing arrived before the read timeout.
    fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, path: &str, settings: &TransportSettings) -> Result<(), ProtocolError> {
        (**self).open(path, settings)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        (**self).write(frame)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError> {
        (**self).read_line()
    }
}

/// Lists the serial ports currently visible to the host
pub trait PortEnumerator {
    /// May fail transiently while a device is re-enumerating
    fn list_ports(&mut self) -> Result<Vec<PortInfo>, ProtocolError>;
}

impl<E: PortEnumerator + ?Sized> PortEnumerator for Box<E> {
    fn list_ports(&mut self) -> Result<Vec<PortInfo>, ProtocolError> {
        (**self).list_ports()
    }
}

/// The device a channel is bound to.
///
/// Vendor and product id are fixed for the channel's lifetime; only the path
/// moves, when the device comes back somewhere else after a reboot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTarget {
    vendor_id: u16,
    product_id: u16,
    path: String,
}

impl TransportTarget {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            path: path.into(),
        }
    }

    /// Build a target from an enumerated port, if it reports USB ids
    pub fn from_port(port: &PortInfo) -> Option<Self> {
        Some(Self::new(port.vid?, port.pid?, port.name.clone()))
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    /// Whether `port` has this target's vendor and product id
    pub fn same_identity(&self, port: &PortInfo) -> bool {
        port.vid == Some(self.vendor_id) && port.pid == Some(self.product_id)
    }
}

/// Whether an I/O error means the device node is gone rather than busy
pub(crate) fn is_link_lost(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::NotFound
    ) {
        return true;
    }

    // EIO, ENXIO, ENODEV
    #[cfg(unix)]
    let gone = [5, 6, 19];
    // ERROR_ACCESS_DENIED, ERROR_GEN_FAILURE, ERROR_BAD_COMMAND, ERROR_DEVICE_NOT_CONNECTED
    #[cfg(windows)]
    let gone = [5, 31, 22, 1167];
    #[cfg(not(any(unix, windows)))]
    let gone: [i32; 0] = [];

    err.raw_os_error().is_some_and(|code| gone.contains(&code))
}
