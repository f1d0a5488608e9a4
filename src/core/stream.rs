//! G-code streaming
//!
//! Line-synchronous: each block is sent only after the controller answered
//! the previous one. No pipelining, no validation of the G-code itself.

use super::channel::CommandChannel;
use super::transport::{Transport, TransportError};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Streaming error types
#[derive(Error, Debug)]
pub enum StreamError {
    /// The G-code file could not be opened
    #[error("Cannot open {path}: {source}")]
    Open {
        /// File path
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// Reading the G-code source failed mid-stream
    #[error("Read failed after {lines_sent} lines: {source}")]
    Read {
        /// Lines already sent
        lines_sent: usize,
        /// Cause
        source: std::io::Error,
    },

    /// Link failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Counters for a finished stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    /// Blocks written
    pub lines_sent: usize,
    /// Source lines skipped as blank or comment-only
    pub lines_skipped: usize,
}

/// Drop everything from the first `;` on
pub fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Block to send for a source line, if any
pub fn prepare_line(line: &str) -> Option<&str> {
    let block = strip_comment(line).trim();
    (!block.is_empty()).then_some(block)
}

/// Stream every block of `source`, waiting for one reply line per block.
/// `ack_timeout` of `None` waits for each reply indefinitely.
pub fn stream_reader<T, R>(
    channel: &mut CommandChannel<T>,
    source: R,
    ack_timeout: Option<Duration>,
) -> Result<StreamReport, StreamError>
where
    T: Transport,
    R: BufRead,
{
    let mut report = StreamReport::default();

    for line in source.lines() {
        let line = line.map_err(|source| StreamError::Read {
            lines_sent: report.lines_sent,
            source,
        })?;

        let Some(block) = prepare_line(&line) else {
            report.lines_skipped += 1;
            continue;
        };

        let response = channel.send_line(block, ack_timeout)?;
        report.lines_sent += 1;
        tracing::debug!(" : {}", response.trim());
    }

    Ok(report)
}

/// Open `path` and stream it
pub fn stream_file<T: Transport>(
    channel: &mut CommandChannel<T>,
    path: &Path,
    ack_timeout: Option<Duration>,
) -> Result<StreamReport, StreamError> {
    tracing::debug!("Opening gcode file: {}", path.display());
    let file = File::open(path).map_err(|source| StreamError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Sending gcode");
    let report = stream_reader(channel, BufReader::new(file), ack_timeout)?;
    tracing::info!(
        "Streamed {} blocks from {} ({} skipped)",
        report.lines_sent,
        path.display(),
        report.lines_skipped
    );
    Ok(report)
}
