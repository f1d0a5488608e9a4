//! CLI Module
//!
//! Provides command-line support functionality including:
//! - Exit codes for automation
//! - Lenient parsing of numeric arguments
//! - Port name normalisation

pub mod args;
pub mod exit_codes;

pub use args::{device_path, parse_feed, parse_optional, OutputFormat};
pub use exit_codes::{exit_code_description, CliResult, ExitCodes};
