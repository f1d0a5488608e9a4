//! Response reader
//!
//! GRBL answers in text, but the end of an answer is ambiguous: normal replies
//! end with a newline, jog acknowledgements and status reports may end with
//! `>`. The reader keeps pulling short slices off the transport until it sees
//! one of the accepted terminators or runs out of time. Running out of time is
//! not an error; whatever arrived so far is handed back and the caller decides
//! whether to poll again.

use super::transport::{Transport, TransportError};
use std::time::{Duration, Instant};

/// Per-read wait while assembling a frame
pub const READ_SLICE: Duration = Duration::from_millis(10);

/// Largest chunk requested from the transport in one read
pub const READ_CHUNK: usize = 1024;

/// Terminators accepted for a controller frame
pub const FRAME_TERMINATORS: &[u8] = b"\n>";

/// Terminators accepted for a plain acknowledgement line
pub const LINE_TERMINATORS: &[u8] = b"\n";

/// Tunables for frame assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Wait per individual transport read
    pub read_slice: Duration,
    /// Largest chunk per transport read
    pub read_chunk: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_slice: READ_SLICE,
            read_chunk: READ_CHUNK,
        }
    }
}

/// Accumulate bytes until the buffer ends with one of `terminators` or the
/// overall deadline passes. `None` waits indefinitely.
pub fn read_until<T: Transport + ?Sized>(
    transport: &mut T,
    config: &ReaderConfig,
    terminators: &[u8],
    timeout: Option<Duration>,
) -> Result<String, TransportError> {
    let start = Instant::now();
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        if buffer.last().is_some_and(|b| terminators.contains(b)) {
            break;
        }
        if timeout.is_some_and(|t| start.elapsed() >= t) {
            tracing::trace!("Read deadline hit with {} bytes buffered", buffer.len());
            break;
        }

        let chunk = transport.read(config.read_chunk, config.read_slice)?;
        buffer.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Read one controller frame (`\n` or `>` terminated), giving up after
/// `timeout`. May return partial or empty text.
pub fn read_frame<T: Transport + ?Sized>(
    transport: &mut T,
    config: &ReaderConfig,
    timeout: Duration,
) -> Result<String, TransportError> {
    read_until(transport, config, FRAME_TERMINATORS, Some(timeout))
}

/// Read one newline-terminated line. Blocks until the line completes when
/// `timeout` is `None`.
pub fn read_line<T: Transport + ?Sized>(
    transport: &mut T,
    config: &ReaderConfig,
    timeout: Option<Duration>,
) -> Result<String, TransportError> {
    read_until(transport, config, LINE_TERMINATORS, timeout)
}
