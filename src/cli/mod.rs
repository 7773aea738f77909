//! Command-line support for the `dataset-loader` binary

pub mod commands;
pub mod error;
pub mod logging;
