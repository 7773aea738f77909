//! Load command
//!
//! Reads the configuration from the environment, connects to the
//! destination database and loads the selected datasets.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::error::CliError;
use crate::database::{self, DatabaseBackendType, DatabaseError, LoaderConfig};
use crate::events::{EventSink, LoadEvent, TracingSink};
use crate::ingest::{ChunkErrorPolicy, LoadOptions};
use crate::orchestrator::{
    DatasetErrorPolicy, DatasetSelector, RunOptions, RunReport, load_catalog, run,
};

/// Load command arguments
#[derive(Debug, Clone)]
pub struct LoadArgs {
    /// Datasets to load; empty means every dataset in the catalog
    pub datasets: Vec<String>,
    /// Rows per chunk
    pub chunk_size: usize,
    /// Suffix appended to the dataset name to form the table name
    pub table_suffix: String,
    /// Per-chunk write timeout in seconds
    pub write_timeout_secs: Option<u64>,
    /// Stop at the first chunk, file or dataset failure
    pub fail_fast: bool,
    /// Write the run report as JSON to this path
    pub report_json: Option<PathBuf>,
}

impl LoadArgs {
    /// Convert the arguments into run options
    pub fn run_options(&self) -> Result<RunOptions, CliError> {
        let chunk_size = NonZeroUsize::new(self.chunk_size).ok_or_else(|| {
            CliError::InvalidArgument("chunk size must be greater than 0".to_string())
        })?;

        if self.write_timeout_secs == Some(0) {
            return Err(CliError::InvalidArgument(
                "write timeout must be greater than 0".to_string(),
            ));
        }

        let (on_chunk_error, on_dataset_error) = if self.fail_fast {
            (ChunkErrorPolicy::Abort, DatasetErrorPolicy::Abort)
        } else {
            (ChunkErrorPolicy::Skip, DatasetErrorPolicy::Continue)
        };

        Ok(RunOptions {
            load: LoadOptions {
                chunk_size,
                table_suffix: self.table_suffix.clone(),
                write_timeout: self.write_timeout_secs.map(Duration::from_secs),
                on_chunk_error,
                ..Default::default()
            },
            on_dataset_error,
        })
    }

    pub fn selector(&self) -> DatasetSelector {
        DatasetSelector::from_names(self.datasets.clone())
    }
}

/// Run the load command
///
/// Startup failures (configuration, catalog, connection) are recorded as a
/// fatal event and returned. Skipped chunks do not make the command fail.
pub fn handle_load(args: &LoadArgs) -> Result<RunReport, CliError> {
    let sink = TracingSink;
    let config = LoaderConfig::from_env().map_err(|e| fatal(&sink, e.into()))?;

    let report = load_with_config(args, &config, &sink)?;

    print_summary(&report);

    if let Some(path) = &args.report_json {
        write_report(path, &report)?;
        println!("Run report written to {}", path.display());
    }

    Ok(report)
}

/// Load the selected datasets into the configured database
///
/// The catalog is loaded before connecting, so a missing or malformed
/// `schemas.json` is reported even when the database is unreachable.
pub fn load_with_config(
    args: &LoadArgs,
    config: &LoaderConfig,
    sink: &dyn EventSink,
) -> Result<RunReport, CliError> {
    let options = args.run_options()?;
    check_backend_options(&options, config.connection.backend)?;

    let catalog = load_catalog(&config.src_base_dir, sink)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    rt.block_on(async {
        let writer = database::connect(&config.connection)
            .await
            .map_err(|e| fatal(sink, e.into()))?;

        let healthy = writer
            .health_check()
            .await
            .map_err(|e| fatal(sink, e.into()))?;
        if !healthy {
            return Err(fatal(
                sink,
                CliError::DatabaseError(DatabaseError::ConnectionFailed(format!(
                    "health check failed for {}",
                    config.connection.masked_url()
                ))),
            ));
        }

        let result = run(
            &config.src_base_dir,
            &catalog,
            writer.as_ref(),
            &args.selector(),
            &options,
            sink,
        )
        .await;

        if let Err(e) = writer.close().await {
            tracing::warn!(error = %e, "Failed to close database connection");
        }

        Ok::<_, CliError>(result?)
    })
}

/// Reject options the selected backend cannot honour
pub fn check_backend_options(
    options: &RunOptions,
    backend: DatabaseBackendType,
) -> Result<(), CliError> {
    if options.load.write_timeout.is_some() && backend == DatabaseBackendType::DuckDB {
        return Err(CliError::InvalidArgument(
            "write timeout is not supported by the DuckDB backend".to_string(),
        ));
    }
    Ok(())
}

fn fatal(sink: &dyn EventSink, e: CliError) -> CliError {
    sink.record(&LoadEvent::Fatal {
        error: e.to_string(),
    });
    e
}

/// Print a human-readable run summary
pub fn print_summary(report: &RunReport) {
    println!(
        "Loaded {} dataset(s) in {}: {} rows, {} chunk(s) written, {} chunk(s) skipped, {} file(s) skipped",
        report.datasets.len(),
        crate::ingest::format_duration(report.duration),
        report.rows_written(),
        report.chunks_written(),
        report.chunks_failed(),
        report.files_failed(),
    );

    for dataset in &report.datasets {
        println!(
            "  {} -> {}: {} file(s), {} chunk(s), {} rows in {} ({:.0} rows/s)",
            dataset.dataset,
            dataset.table,
            dataset.files_processed + dataset.files_failed,
            dataset.chunks_written,
            dataset.rows_written,
            dataset.duration_string(),
            dataset.throughput(),
        );

        for failure in &dataset.failures {
            match failure.chunk {
                Some(chunk) => println!(
                    "    skipped chunk {} of {}: {}",
                    chunk,
                    failure.file.display(),
                    failure.error
                ),
                None => println!(
                    "    skipped file {}: {}",
                    failure.file.display(),
                    failure.error
                ),
            }
        }

        let unlisted = dataset.failures_count - dataset.failures.len();
        if unlisted > 0 {
            println!("    ... and {} more", unlisted);
        }
    }

    for failed in &report.failed {
        println!("  FAILED {}: {}", failed.dataset, failed.error);
    }
}

/// Write the run report as pretty-printed JSON
pub fn write_report(path: &Path, report: &RunReport) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::FileWriteError(path.to_path_buf(), e.to_string()))?;

    fs::write(path, json).map_err(|e| CliError::FileWriteError(path.to_path_buf(), e.to_string()))
}
