//! Scripted in-memory controller shared by the integration tests

#![allow(dead_code)]

use bytes::Bytes;
use grblctl_core::{CommandChannel, Transport, TransportError};
use std::collections::VecDeque;
use std::time::Duration;

/// One exchange seen by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Write(String),
    Read(String),
}

/// Answers every write with the next scripted reply
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<String>,
    pending: VecDeque<u8>,
    pub log: Vec<Exchange>,
    pub close_calls: usize,
}

impl ScriptedTransport {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Bytes already waiting before the first write, like a startup banner
    pub fn with_banner(mut self, banner: &str) -> Self {
        self.pending.extend(banner.bytes());
        self
    }

    pub fn writes(&self) -> Vec<&str> {
        self.log
            .iter()
            .filter_map(|e| match e {
                Exchange::Write(s) => Some(s.as_str()),
                Exchange::Read(_) => None,
            })
            .collect()
    }

    pub fn count_writes(&self, command: &str) -> usize {
        self.writes().iter().filter(|w| **w == command).count()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for ScriptedTransport {
    fn read(&mut self, max_bytes: usize, _timeout: Duration) -> Result<Bytes, TransportError> {
        let n = max_bytes.min(self.pending.len());
        if n == 0 {
            return Ok(Bytes::new());
        }
        let chunk: Vec<u8> = self.pending.drain(..n).collect();
        self.log
            .push(Exchange::Read(String::from_utf8_lossy(&chunk).into_owned()));
        Ok(Bytes::from(chunk))
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let command = String::from_utf8_lossy(data).into_owned();
        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| panic!("script exhausted at {command:?}"));
        self.log.push(Exchange::Write(command));
        self.pending.extend(reply.bytes());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.close_calls += 1;
        Ok(())
    }

    fn connection_info(&self) -> String {
        "scripted".to_string()
    }
}

pub const OK: &str = "ok\n";

/// Status report with the given state, position and `Pn:` letters
pub fn status(state: &str, mpos: &str, pins: &str) -> String {
    format!("<{state}|MPos:{mpos}|FS:0,0|Pn:{pins}>")
}

pub fn channel<I, S>(replies: I) -> CommandChannel<ScriptedTransport>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandChannel::new(ScriptedTransport::new(replies))
}
