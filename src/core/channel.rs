//! Command channel
//!
//! Strict request/response over the transport: write one command, read one
//! frame. There is never more than one command in flight; the channel takes
//! `&mut self` for every exchange, so the borrow checker enforces that.

use super::reader::{self, ReaderConfig};
use super::status::{PinMatchMode, StatusFrame};
use super::transport::{Transport, TransportError};
use std::time::Duration;

/// Default wait for a reply
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Status query command
pub const STATUS_QUERY: &str = "?";

/// Owns the connection for the duration of a run
pub struct CommandChannel<T: Transport> {
    transport: T,
    reader: ReaderConfig,
    query_timeout: Duration,
    pin_mode: PinMatchMode,
    polls: u64,
}

impl<T: Transport> CommandChannel<T> {
    /// Wrap an open transport with default timing
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            reader: ReaderConfig::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            pin_mode: PinMatchMode::default(),
            polls: 0,
        }
    }

    /// Override the per-read slice and chunk size
    #[must_use]
    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    /// Override the default reply timeout
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Select how pin flags are recognised in status reports
    #[must_use]
    pub fn with_pin_mode(mut self, mode: PinMatchMode) -> Self {
        self.pin_mode = mode;
        self
    }

    /// Send `command` verbatim and return the next frame, waiting up to the
    /// default timeout. The caller supplies any trailing newline.
    pub fn query(&mut self, command: &str) -> Result<String, TransportError> {
        self.query_with_timeout(command, self.query_timeout)
    }

    /// Same as [`query`](Self::query) with an explicit timeout
    pub fn query_with_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        tracing::debug!("Sending: {}", command.trim_end());
        self.transport.write(command.as_bytes())?;
        let response = reader::read_frame(&mut self.transport, &self.reader, timeout)?;
        tracing::trace!("Received: {:?}", response);
        Ok(response)
    }

    /// Send `?` and parse the reply
    pub fn status(&mut self) -> Result<StatusFrame, TransportError> {
        let response = self.query(STATUS_QUERY)?;
        self.polls += 1;
        Ok(StatusFrame::parse(&response, self.pin_mode))
    }

    /// Read a frame without sending anything first, e.g. the startup banner
    pub fn read_frame(&mut self, timeout: Duration) -> Result<String, TransportError> {
        reader::read_frame(&mut self.transport, &self.reader, timeout)
    }

    /// Write a line and block for exactly one newline-terminated reply
    pub fn send_line(
        &mut self,
        line: &str,
        timeout: Option<Duration>,
    ) -> Result<String, TransportError> {
        tracing::debug!("Sending: {}", line);
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.transport.write(&data)?;
        reader::read_line(&mut self.transport, &self.reader, timeout)
    }

    /// Number of status polls issued so far
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Pin detection mode in use
    pub fn pin_mode(&self) -> PinMatchMode {
        self.pin_mode
    }

    /// Connection description
    pub fn connection_info(&self) -> String {
        self.transport.connection_info()
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Close the underlying connection
    pub fn close(&mut self) -> Result<(), TransportError> {
        self.transport.close()
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::Pin;
    use crate::core::transport::MockTransport;
    use bytes::Bytes;

    #[test]
    fn test_query_writes_then_reads() {
        let mut mock = MockTransport::new();
        mock.expect_write()
            .withf(|data| data == b"?")
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_read()
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(b"<Idle|MPos:0,0,0|Pn:P>")));

        let mut channel = CommandChannel::new(mock);
        let frame = channel.status().unwrap();
        assert!(frame.has_pin(Pin::Probe));
        assert_eq!(channel.polls(), 1);
    }

    #[test]
    fn test_send_line_appends_newline() {
        let mut mock = MockTransport::new();
        mock.expect_write()
            .withf(|data| data == b"G0 X1\n")
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_read()
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(b"ok\r\n")));

        let mut channel = CommandChannel::new(mock);
        assert_eq!(channel.send_line("G0 X1", None).unwrap(), "ok\r\n");
        assert_eq!(channel.polls(), 0);
    }

    #[test]
    fn test_write_failure_skips_read() {
        let mut mock = MockTransport::new();
        mock.expect_write().returning(|_| Err(TransportError::Closed));
        mock.expect_read().never();

        let mut channel = CommandChannel::new(mock);
        assert!(matches!(channel.query("!"), Err(TransportError::Closed)));
    }
}
