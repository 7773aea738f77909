//! Per-dataset load statistics

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of failures kept in a report
pub const MAX_RECORDED_FAILURES: usize = 100;

/// A chunk or file that was skipped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    /// Source file the failure belongs to
    pub file: PathBuf,
    /// Chunk index, or None when the whole file failed
    pub chunk: Option<usize>,
    /// Error message
    pub error: String,
}

/// Outcome of loading one dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetReport {
    /// Dataset name
    pub dataset: String,
    /// Destination table
    pub table: String,
    /// Number of files read to the end
    pub files_processed: usize,
    /// Number of files that could not be read to the end
    pub files_failed: usize,
    /// Number of chunks written
    pub chunks_written: usize,
    /// Number of chunks skipped after a parse or write error
    pub chunks_failed: usize,
    /// Number of rows written
    pub rows_written: u64,
    /// Number of failures encountered
    pub failures_count: usize,
    /// Failures (limited to the first 100)
    pub failures: Vec<ChunkFailure>,
    /// Duration of the load
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
}

pub(crate) fn serialize_secs<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl DatasetReport {
    /// Create an empty report for a dataset
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    /// Record a failure (limited to 100)
    pub fn add_failure(&mut self, failure: ChunkFailure) {
        self.failures_count += 1;
        if self.failures.len() < MAX_RECORDED_FAILURES {
            self.failures.push(failure);
        }
    }

    /// Whether every chunk of every file was written
    pub fn is_complete(&self) -> bool {
        self.failures_count == 0
    }

    /// Get rows per second throughput
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows_written as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        format_duration(self.duration)
    }
}

/// Format a duration as `1h 2m 3s`, `2m 3s` or `3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
