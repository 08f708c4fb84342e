//! Tracing setup for Undertow
//!
//! Console output follows the level the user picked; a second layer writes
//! everything at TRACE to `undertow-last-run.log` so a failed validation run
//! can be inspected after the fact.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::UndertowError;

/// File name of the per-run debug log.
pub const DEBUG_LOG_FILE: &str = "undertow-last-run.log";

/// Initialize tracing with console output at `console_level` and a full
/// TRACE log under `logs_dir` (defaults to `./logs`).
///
/// Returns the path of the debug log file. `RUST_LOG` overrides the console
/// filter when set.
///
/// # Errors
///
/// - `UndertowError::Io` - If the logs directory or log file cannot be created
/// - `UndertowError::Configuration` - If a global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, UndertowError> {
    let log_file_path = prepare_log_file(logs_dir.unwrap_or_else(|| Path::new("logs")))?;
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| UndertowError::Configuration {
            reason: format!("tracing already initialized: {e}"),
        })?;

    tracing::info!(
        "Tracing initialized: console={}, debug_file={}",
        console_level,
        log_file_path.display()
    );

    Ok(log_file_path)
}

/// Creates `logs_dir` if needed and returns the debug log path inside it.
fn prepare_log_file(logs_dir: &Path) -> Result<PathBuf, UndertowError> {
    create_dir_all(logs_dir)?;
    Ok(logs_dir.join(DEBUG_LOG_FILE))
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use undertow_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(CliLogLevel::Error),
            "warn" | "warning" => Ok(CliLogLevel::Warn),
            "info" => Ok(CliLogLevel::Info),
            "debug" => Ok(CliLogLevel::Debug),
            "trace" => Ok(CliLogLevel::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARNING".parse::<CliLogLevel>(), Ok(CliLogLevel::Warn));
        assert_eq!("trace".parse::<CliLogLevel>(), Ok(CliLogLevel::Trace));
        assert!("verbose".parse::<CliLogLevel>().is_err());
        assert_eq!(CliLogLevel::Debug.to_string(), "debug");
        assert_eq!(CliLogLevel::Error.as_tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_prepare_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("logs");

        let path = prepare_log_file(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(path, nested.join(DEBUG_LOG_FILE));
    }
}
