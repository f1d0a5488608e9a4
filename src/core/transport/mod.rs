//! Transport layer for the controller link
//!
//! The controller is reached over a byte-serial connection. Everything above
//! this module talks to a [`Transport`], so tests can swap the serial port for
//! an in-memory script.

mod serial;

pub use serial::{list_ports, SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Device went away mid-session
    #[error("Disconnected")]
    Disconnected,

    /// Used after `close()`
    #[error("Connection already closed")]
    Closed,
}

impl TransportError {
    /// True for failures that happen while opening the device.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::PortNotFound(_) | Self::PermissionDenied(_)
        )
    }
}

/// Byte-level link to the controller.
///
/// Reads never block past their deadline: a timeout yields an empty buffer,
/// not an error.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Read up to `max_bytes`, waiting at most `timeout` for the first byte.
    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Bytes, TransportError>;

    /// Write all of `data` and flush.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Release the device. Calling it twice is harmless.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Human readable description of the link
    fn connection_info(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Bytes, TransportError> {
        (**self).read(max_bytes, timeout)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn connection_info(&self) -> String {
        (**self).connection_info()
    }
}
