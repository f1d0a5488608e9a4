//! Lenient argument handling
//!
//! Offsets, feed and beam power arrive as free text. A value that does not
//! parse is treated as absent instead of aborting the run.

use clap::ValueEnum;
use std::str::FromStr;

/// CLI output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format for scripting
    Json,
}

/// Parse an optional argument. Absent or unparsable input gives `None`.
pub fn parse_optional<T: FromStr>(name: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw?.trim();
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {} value {:?}", name, raw);
            None
        }
    }
}

/// Feed rate: `default` when absent, `fallback` when present but unparsable
pub fn parse_feed(raw: Option<&str>, default: u32, fallback: u32) -> u32 {
    match raw {
        None => default,
        Some(_) => parse_optional("feed", raw).unwrap_or(fallback),
    }
}

/// Device path for a port argument. On Unix `ttyUSB0`, `dev/ttyUSB0` and
/// `/dev/ttyUSB0` all name `/dev/ttyUSB0`; elsewhere the name is used as is.
pub fn device_path(port: &str) -> String {
    if cfg!(unix) {
        let name = port
            .trim()
            .trim_start_matches('/')
            .trim_start_matches("dev/")
            .trim_start_matches('/');
        format!("/dev/{name}")
    } else {
        port.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional::<f64>("x", Some("12.5")), Some(12.5));
        assert_eq!(parse_optional::<f64>("x", Some(" -3 ")), Some(-3.0));
        assert_eq!(parse_optional::<f64>("x", Some("abc")), None);
        assert_eq!(parse_optional::<f64>("x", None), None);
    }

    #[test]
    fn test_parse_feed() {
        assert_eq!(parse_feed(None, 1000, 100), 1000);
        assert_eq!(parse_feed(Some("250"), 1000, 100), 250);
        assert_eq!(parse_feed(Some("fast"), 1000, 100), 100);
        assert_eq!(parse_feed(Some("-5"), 1000, 100), 100);
    }

    #[cfg(unix)]
    #[test]
    fn test_device_path() {
        assert_eq!(device_path("ttyUSB0"), "/dev/ttyUSB0");
        assert_eq!(device_path("dev/ttyUSB0"), "/dev/ttyUSB0");
        assert_eq!(device_path("/dev/ttyACM1"), "/dev/ttyACM1");
    }
}
