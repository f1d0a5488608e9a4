//! Application settings

use crate::core::channel::{CommandChannel, DEFAULT_QUERY_TIMEOUT};
use crate::core::job::{JobSettings, DEFAULT_BANNER_TIMEOUT};
use crate::core::reader::{ReaderConfig, READ_CHUNK, READ_SLICE};
use crate::core::sequence::{HomingConfig, LevelingConfig, PollLimit, SequenceConfig};
use crate::core::status::PinMatchMode;
use crate::core::transport::{SerialConfig, Transport, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("Cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file malformed
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be written
    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial link
    pub serial: SerialSettings,
    /// Query/response timing and parsing
    pub protocol: ProtocolConfig,
    /// Manual jog defaults
    pub motion: MotionConfig,
    /// Probe touch-off
    pub leveling: LevelingConfig,
    /// Limit-switch homing
    pub homing: HomingConfig,
    /// Poll loop bounds
    pub sequence: PollSettings,
    /// G-code streaming
    pub stream: StreamConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load config from the default location. A missing file gives defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match super::config_file() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from `path`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Serial port settings
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(&self.serial.port, self.serial.baud_rate)
    }

    /// Frame assembly settings
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            read_slice: Duration::from_millis(self.protocol.read_slice_ms),
            read_chunk: self.protocol.read_chunk,
        }
    }

    /// Sequence parameters
    pub fn sequence_config(&self) -> SequenceConfig {
        SequenceConfig {
            leveling: self.leveling,
            homing: self.homing,
            poll_limit: self.sequence.poll_limit,
        }
    }

    /// Run timing
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            banner_timeout: Duration::from_millis(self.serial.banner_timeout_ms),
            stream_ack_timeout: self.stream.ack_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Wrap `transport` in a channel configured from these settings
    pub fn channel<T: Transport>(&self, transport: T) -> CommandChannel<T> {
        CommandChannel::new(transport)
            .with_reader(self.reader_config())
            .with_query_timeout(Duration::from_millis(self.protocol.query_timeout_ms))
            .with_pin_mode(self.protocol.pin_match)
    }
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Wait for the startup banner (ms)
    pub banner_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            banner_timeout_ms: DEFAULT_BANNER_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Query/response settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Reply wait per query (ms)
    pub query_timeout_ms: u64,
    /// Wait per transport read (ms)
    pub read_slice_ms: u64,
    /// Largest chunk per transport read
    pub read_chunk: usize,
    /// Pin flag recognition
    pub pin_match: PinMatchMode,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT.as_millis() as u64,
            read_slice_ms: READ_SLICE.as_millis() as u64,
            read_chunk: READ_CHUNK,
            pin_match: PinMatchMode::default(),
        }
    }
}

/// Manual jog defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Feed rate when none is given
    pub feed_rate: u32,
    /// Feed rate when the given one cannot be parsed
    pub invalid_feed_rate: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            feed_rate: 1000,
            invalid_feed_rate: 100,
        }
    }
}

/// Poll loop bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Applied to idle-wait, leveling and homing
    pub poll_limit: PollLimit,
}

/// Streaming settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Per-block reply wait (ms); unset blocks until a reply arrives
    pub ack_timeout_ms: Option<u64>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
