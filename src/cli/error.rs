//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::database::{ConfigError, DatabaseError};
use crate::orchestrator::RunError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("{0}")]
    RunError(#[from] RunError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Failed to initialize logging: {0}")]
    LoggingError(String),

    #[error("IO error: {0}")]
    IoError(String),
}
