//! # grblctl Core Library
//!
//! Drives a GRBL CNC controller over a serial link:
//! - Relative jogs, feed hold and laser/spindle power
//! - Status polling (`?`) with position and pin flag parsing
//! - Probe touch-off leveling on Z
//! - Limit-switch homing on X and Y
//! - Line-synchronous G-code streaming
//!
//! Everything runs on one thread with one request in flight. The connection
//! is owned by a [`CommandChannel`] that is passed to every operation.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grblctl_core::{CommandChannel, SerialConfig, SerialTransport, Sequencer};
//!
//! fn main() -> anyhow::Result<()> {
//!     let transport = SerialTransport::open(SerialConfig::new("/dev/ttyUSB0", 115200))?;
//!     let mut channel = CommandChannel::new(transport);
//!
//!     let sequencer = Sequencer::default();
//!     sequencer.level(&mut channel)?;
//!
//!     let report = sequencer.wait_for_idle(&mut channel)?;
//!     println!("Offset: {}", report.status.position);
//!
//!     channel.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::channel::CommandChannel;
pub use crate::core::job::{run_job, JobEvent, JobPlan, JobReport, JobSettings};
pub use crate::core::motion::{halt, jog, laser, JogCommand};
pub use crate::core::sequence::{
    Axis, AxisPhase, AxisReport, HomingConfig, HomingReport, IdleReport, LevelingConfig,
    PollLimit, SequenceConfig, SequenceOutcome, Sequencer,
};
pub use crate::core::status::{Pin, PinMatchMode, Position, StatusFrame};
pub use crate::core::stream::{stream_file, stream_reader, StreamError, StreamReport};
pub use crate::core::transport::{SerialConfig, SerialTransport, Transport, TransportError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
