//! Core module containing the controller interaction
//!
//! This module provides:
//! - Transport layer (serial port, or anything implementing [`transport::Transport`])
//! - Response reader with `\n` / `>` framing and read deadlines
//! - Command channel (one request in flight at a time)
//! - Status report parsing
//! - Motion primitives (jog, feed hold, laser)
//! - Control sequences (idle-wait, leveling, homing)
//! - Line-synchronous G-code streaming
//! - Run orchestration

pub mod channel;
pub mod job;
pub mod motion;
pub mod reader;
pub mod sequence;
pub mod status;
pub mod stream;
pub mod transport;
