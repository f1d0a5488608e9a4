//! Motion primitives: jog, feed hold and spindle/laser output

use super::channel::CommandChannel;
use super::transport::{Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Feed hold realtime command
pub const FEED_HOLD: &str = "!";

/// Relative jog. Absent axes do not move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JogCommand {
    /// X offset
    pub x: Option<f64>,
    /// Y offset
    pub y: Option<f64>,
    /// Z offset
    pub z: Option<f64>,
    /// Feed rate (mm/min)
    pub feed: u32,
}

impl JogCommand {
    /// Jog with every axis absent
    pub fn new(feed: u32) -> Self {
        Self {
            feed,
            ..Self::default()
        }
    }

    /// Set X offset
    #[must_use]
    pub fn x(mut self, offset: f64) -> Self {
        self.x = Some(offset);
        self
    }

    /// Set Y offset
    #[must_use]
    pub fn y(mut self, offset: f64) -> Self {
        self.y = Some(offset);
        self
    }

    /// Set Z offset
    #[must_use]
    pub fn z(mut self, offset: f64) -> Self {
        self.z = Some(offset);
        self
    }

    /// True if no axis is set
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    /// Wire form, e.g. `$j=x-500 f300\n`. `None` when no axis is set.
    pub fn to_command(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut msg = String::from("$j=");
        for (letter, offset) in [('x', self.x), ('y', self.y), ('z', self.z)] {
            if let Some(offset) = offset {
                let _ = write!(msg, "{letter}{offset} ");
            }
        }
        let _ = writeln!(msg, "f{}", self.feed);
        Some(msg)
    }
}

/// Send a jog. An empty jog is dropped without touching the channel.
/// Returns the controller's reply, if a command was sent.
pub fn jog<T: Transport>(
    channel: &mut CommandChannel<T>,
    command: &JogCommand,
) -> Result<Option<String>, TransportError> {
    let Some(msg) = command.to_command() else {
        tracing::trace!("Empty jog skipped");
        return Ok(None);
    };

    let response = channel.query(&msg)?;
    tracing::debug!("Response: {}", response.trim_end());
    Ok(Some(response))
}

/// Feed hold: freeze the current motion.
pub fn halt<T: Transport>(channel: &mut CommandChannel<T>) -> Result<String, TransportError> {
    let response = channel.query(FEED_HOLD)?;
    tracing::debug!("Response: {}", response.trim_end());
    Ok(response)
}

/// Wire form of a spindle/laser power change. Zero turns the output off.
pub fn laser_command(power: u32) -> String {
    if power > 0 {
        format!("M03 S{power}\n")
    } else {
        "M05\n".to_string()
    }
}

/// Switch the spindle/laser output. `None` (unparsable power) and zero both
/// switch it off.
pub fn laser<T: Transport>(
    channel: &mut CommandChannel<T>,
    power: Option<u32>,
) -> Result<String, TransportError> {
    let response = channel.query(&laser_command(power.unwrap_or(0)))?;
    tracing::debug!("Response: {}", response.trim_end());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::MockTransport;
    use bytes::Bytes;

    #[test]
    fn test_jog_format() {
        assert_eq!(
            JogCommand::new(300).x(-500.0).to_command().as_deref(),
            Some("$j=x-500 f300\n")
        );
        assert_eq!(
            JogCommand::new(1000).x(1.5).y(-2.25).z(0.1).to_command().as_deref(),
            Some("$j=x1.5 y-2.25 z0.1 f1000\n")
        );
        assert_eq!(
            JogCommand::new(50).z(-20.0).to_command().as_deref(),
            Some("$j=z-20 f50\n")
        );
    }

    #[test]
    fn test_empty_jog_writes_nothing() {
        let mut mock = MockTransport::new();
        mock.expect_write().never();
        mock.expect_read().never();

        let mut channel = CommandChannel::new(mock);
        let sent = jog(&mut channel, &JogCommand::new(1000)).unwrap();
        assert!(sent.is_none());
    }

    #[test]
    fn test_halt_sends_feed_hold() {
        let mut mock = MockTransport::new();
        mock.expect_write()
            .withf(|data| data == b"!")
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_read()
            .returning(|_, _| Ok(Bytes::from_static(b"ok\n")));

        let mut channel = CommandChannel::new(mock);
        assert_eq!(halt(&mut channel).unwrap(), "ok\n");
    }

    #[test]
    fn test_laser_commands() {
        assert_eq!(laser_command(255), "M03 S255\n");
        assert_eq!(laser_command(0), "M05\n");
    }

    #[test]
    fn test_unparsable_power_turns_laser_off() {
        let mut mock = MockTransport::new();
        mock.expect_write()
            .withf(|data| data == b"M05\n")
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_read()
            .returning(|_, _| Ok(Bytes::from_static(b"ok\n")));

        let mut channel = CommandChannel::new(mock);
        laser(&mut channel, None).unwrap();
    }
}
