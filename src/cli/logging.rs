//! Logging setup for the binary
//!
//! Log records go to the console and are appended to
//! `<log_dir>/application.log` without ANSI colors.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::error::CliError;

/// Name of the log file inside the log directory
pub const LOG_FILE_NAME: &str = "application.log";

/// Default log directory, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Initialize console and file logging
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to `default_level`.
///
/// # Returns
/// Path of the log file
pub fn init(log_dir: &Path, default_level: &str) -> Result<PathBuf, CliError> {
    fs::create_dir_all(log_dir).map_err(|e| {
        CliError::LoggingError(format!("cannot create {}: {}", log_dir.display(), e))
    })?;

    let path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| CliError::LoggingError(format!("cannot open {}: {}", path.display(), e)))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| CliError::LoggingError(e.to_string()))?;

    Ok(path)
}
