//! Serial port transport implementation

use super::{Transport, TransportError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// GRBL talks 8N1 at this rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl SerialConfig {
    /// Create a new serial configuration
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", DEFAULT_BAUD_RATE)
    }
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    timeout: Duration,
}

impl SerialTransport {
    /// Open the device. Fails before any byte is exchanged.
    pub fn open(config: SerialConfig) -> Result<Self, TransportError> {
        let timeout = Duration::from_millis(10);
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(config.port.clone()),
                serialport::ErrorKind::Io(io_kind) => match io_kind {
                    std::io::ErrorKind::NotFound => {
                        TransportError::PortNotFound(config.port.clone())
                    }
                    std::io::ErrorKind::PermissionDenied => {
                        TransportError::PermissionDenied(config.port.clone())
                    }
                    _ => TransportError::ConnectionFailed(e.to_string()),
                },
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        tracing::debug!("Opened {} @ {} baud", config.port, config.baud_rate);

        Ok(Self {
            config,
            port: Some(port),
            timeout,
        })
    }

    /// Port configuration
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Bytes, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;

        if timeout != self.timeout {
            port.set_timeout(timeout)
                .map_err(|e| TransportError::IoError(e.into()))?;
            self.timeout = timeout;
        }

        let mut buffer = vec![0u8; max_bytes.max(1)];

        match port.read(&mut buffer) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(n) => {
                buffer.truncate(n);
                Ok(Bytes::from(buffer))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // No data within the deadline
                Ok(Bytes::new())
            }
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            tracing::debug!("Closed {}", self.config.port);
        }
        Ok(())
    }

    fn connection_info(&self) -> String {
        format!("{} @ {} baud (8N1)", self.config.port, self.config.baud_rate)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}
