//! The bulk transport boundary.
//!
//! A transport moves PTP containers over a device's bulk endpoints. It has no state
//! machine beyond endpoint I/O: the session decides what to send and when. A real USB
//! implementation lives in the embedding application; [`VirtualDevice`] answers from memory.

use std::io::Write;

use crate::ptp::Container;

#[cfg(any(test, feature = "virtual-device"))]
mod virtual_device;

#[cfg(any(test, feature = "virtual-device"))]
pub use virtual_device::{TransactionRecord, VIRTUAL_STORAGE_ID, VirtualDevice, VirtualObject};

/// Default max packet size of a high-speed USB bulk endpoint.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 512;

/// Errors a transport reports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TransportError {
    /// No device to talk to.
    NoDevice,
    /// Device went away mid-transfer.
    Disconnected,
    /// Endpoint I/O timed out.
    Timeout,
    /// Other I/O failure.
    Io { message: String },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDevice => write!(f, "no device"),
            Self::Disconnected => write!(f, "device disconnected"),
            Self::Timeout => write!(f, "transfer timed out"),
            Self::Io { message } => write!(f, "I/O error: {message}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Self::Timeout,
            std::io::ErrorKind::NotConnected | std::io::ErrorKind::BrokenPipe => Self::Disconnected,
            _ => Self::Io { message: e.to_string() },
        }
    }
}

/// Ordered, reliable delivery of PTP containers over bulk endpoints.
///
/// Calls are strictly sequential within a transaction: `send_request`, then an optional
/// data phase (`write_bytes` calls, or one `read_data`), then `read_response`.
pub trait Transport {
    /// Sends a command container.
    fn send_request(&mut self, request: &Container) -> Result<(), TransportError>;

    /// Performs one bulk-out write. An empty slice is a zero-length packet.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads an inbound data phase, streaming its payload (without header) into `sink`.
    ///
    /// Returns the payload length. Returns 0 without touching `sink` when the device
    /// skipped the data phase and answered with a response straight away.
    fn read_data(&mut self, sink: &mut dyn Write) -> Result<u64, TransportError>;

    /// Reads the response container that closes a transaction.
    fn read_response(&mut self) -> Result<Container, TransportError>;

    /// Max packet size of the bulk-out endpoint, used for zero-length termination.
    fn max_packet_size(&self) -> usize {
        DEFAULT_MAX_PACKET_SIZE
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_request(&mut self, request: &Container) -> Result<(), TransportError> {
        (**self).send_request(request)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_bytes(bytes)
    }

    fn read_data(&mut self, sink: &mut dyn Write) -> Result<u64, TransportError> {
        (**self).read_data(sink)
    }

    fn read_response(&mut self) -> Result<Container, TransportError> {
        (**self).read_response()
    }

    fn max_packet_size(&self) -> usize {
        (**self).max_packet_size()
    }
}
