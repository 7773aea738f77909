//! Load events and the sinks that record them
//!
//! The loader and orchestrator report progress and failures as a
//! [`LoadEvent`] handed to an injected [`EventSink`].
//! [`TracingSink`] forwards events to `tracing` with structured fields;
//! [`MemorySink`] keeps them for inspection.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Info,
    Error,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLevel::Info => write!(f, "INFO"),
            EventLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Something observable that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// The schema catalog was loaded
    CatalogLoaded { path: PathBuf, datasets: usize },

    /// Columns were resolved and the dataset is about to be loaded
    DatasetStarted {
        dataset: String,
        table: String,
        columns: usize,
        files: usize,
    },

    /// A source file is about to be read
    FileStarted { dataset: String, file: PathBuf },

    /// A chunk was read and is about to be written
    ChunkStarted {
        dataset: String,
        file: PathBuf,
        chunk: usize,
        rows: usize,
    },

    /// A chunk was written
    ChunkWritten {
        dataset: String,
        file: PathBuf,
        chunk: usize,
        rows: u64,
    },

    /// A chunk could not be parsed or written and was skipped
    ChunkFailed {
        dataset: String,
        file: PathBuf,
        chunk: usize,
        error: String,
    },

    /// A file could not be opened or read to the end
    FileFailed {
        dataset: String,
        file: PathBuf,
        error: String,
    },

    /// All files of a dataset were processed
    DatasetFinished {
        dataset: String,
        files: usize,
        chunks_written: usize,
        chunks_failed: usize,
        rows_written: u64,
    },

    /// The dataset could not be loaded at all
    DatasetFailed { dataset: String, error: String },

    /// The run cannot continue
    Fatal { error: String },
}

impl LoadEvent {
    pub fn level(&self) -> EventLevel {
        match self {
            LoadEvent::CatalogLoaded { .. }
            | LoadEvent::DatasetStarted { .. }
            | LoadEvent::FileStarted { .. }
            | LoadEvent::ChunkStarted { .. }
            | LoadEvent::ChunkWritten { .. }
            | LoadEvent::DatasetFinished { .. } => EventLevel::Info,
            LoadEvent::ChunkFailed { .. }
            | LoadEvent::FileFailed { .. }
            | LoadEvent::DatasetFailed { .. }
            | LoadEvent::Fatal { .. } => EventLevel::Error,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            LoadEvent::CatalogLoaded { .. } => "Schema catalog loaded",
            LoadEvent::DatasetStarted { .. } => "Loading dataset",
            LoadEvent::FileStarted { .. } => "Processing file",
            LoadEvent::ChunkStarted { .. } => "Processing chunk",
            LoadEvent::ChunkWritten { .. } => "Chunk written",
            LoadEvent::ChunkFailed { .. } => "Chunk failed, skipping",
            LoadEvent::FileFailed { .. } => "File failed, skipping",
            LoadEvent::DatasetFinished { .. } => "Dataset loaded",
            LoadEvent::DatasetFailed { .. } => "Dataset failed",
            LoadEvent::Fatal { .. } => "Run aborted",
        }
    }

    /// Structured fields as name/value pairs
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let path = |p: &PathBuf| p.display().to_string();

        match self {
            LoadEvent::CatalogLoaded { path: p, datasets } => {
                vec![("path", path(p)), ("datasets", datasets.to_string())]
            }
            LoadEvent::DatasetStarted {
                dataset,
                table,
                columns,
                files,
            } => vec![
                ("dataset", dataset.clone()),
                ("table", table.clone()),
                ("columns", columns.to_string()),
                ("files", files.to_string()),
            ],
            LoadEvent::FileStarted { dataset, file } => {
                vec![("dataset", dataset.clone()), ("file", path(file))]
            }
            LoadEvent::ChunkStarted {
                dataset,
                file,
                chunk,
                rows,
            } => vec![
                ("dataset", dataset.clone()),
                ("file", path(file)),
                ("chunk", chunk.to_string()),
                ("rows", rows.to_string()),
            ],
            LoadEvent::ChunkWritten {
                dataset,
                file,
                chunk,
                rows,
            } => vec![
                ("dataset", dataset.clone()),
                ("file", path(file)),
                ("chunk", chunk.to_string()),
                ("rows", rows.to_string()),
            ],
            LoadEvent::ChunkFailed {
                dataset,
                file,
                chunk,
                error,
            } => vec![
                ("dataset", dataset.clone()),
                ("file", path(file)),
                ("chunk", chunk.to_string()),
                ("error", error.clone()),
            ],
            LoadEvent::FileFailed {
                dataset,
                file,
                error,
            } => vec![
                ("dataset", dataset.clone()),
                ("file", path(file)),
                ("error", error.clone()),
            ],
            LoadEvent::DatasetFinished {
                dataset,
                files,
                chunks_written,
                chunks_failed,
                rows_written,
            } => vec![
                ("dataset", dataset.clone()),
                ("files", files.to_string()),
                ("chunks_written", chunks_written.to_string()),
                ("chunks_failed", chunks_failed.to_string()),
                ("rows_written", rows_written.to_string()),
            ],
            LoadEvent::DatasetFailed { dataset, error } => {
                vec![("dataset", dataset.clone()), ("error", error.clone())]
            }
            LoadEvent::Fatal { error } => vec![("error", error.clone())],
        }
    }
}

impl fmt::Display for LoadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())?;
        for (name, value) in self.fields() {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}

/// Receives load events
pub trait EventSink {
    fn record(&self, event: &LoadEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &LoadEvent) {
        let message = event.message();

        match event {
            LoadEvent::CatalogLoaded { path, datasets } => {
                tracing::info!(path = %path.display(), datasets, "{}", message)
            }
            LoadEvent::DatasetStarted {
                dataset,
                table,
                columns,
                files,
            } => tracing::info!(dataset = %dataset, table = %table, columns, files, "{}", message),
            LoadEvent::FileStarted { dataset, file } => {
                tracing::info!(dataset = %dataset, file = %file.display(), "{}", message)
            }
            LoadEvent::ChunkStarted {
                dataset,
                file,
                chunk,
                rows,
            } => tracing::info!(dataset = %dataset, file = %file.display(), chunk, rows, "{}", message),
            LoadEvent::ChunkWritten {
                dataset,
                file,
                chunk,
                rows,
            } => tracing::info!(dataset = %dataset, file = %file.display(), chunk, rows, "{}", message),
            LoadEvent::ChunkFailed {
                dataset,
                file,
                chunk,
                error,
            } => tracing::error!(dataset = %dataset, file = %file.display(), chunk, error = %error, "{}", message),
            LoadEvent::FileFailed {
                dataset,
                file,
                error,
            } => tracing::error!(dataset = %dataset, file = %file.display(), error = %error, "{}", message),
            LoadEvent::DatasetFinished {
                dataset,
                files,
                chunks_written,
                chunks_failed,
                rows_written,
            } => tracing::info!(
                dataset = %dataset,
                files,
                chunks_written,
                chunks_failed,
                rows_written,
                "{}",
                message
            ),
            LoadEvent::DatasetFailed { dataset, error } => {
                tracing::error!(dataset = %dataset, error = %error, "{}", message)
            }
            LoadEvent::Fatal { error } => tracing::error!(error = %error, "{}", message),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LoadEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<LoadEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events at `level`
    pub fn count_level(&self, level: EventLevel) -> usize {
        self.events()
            .iter()
            .filter(|event| event.level() == level)
            .count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &LoadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let failed = LoadEvent::ChunkFailed {
            dataset: "sales".to_string(),
            file: PathBuf::from("/data/sales/part-0001"),
            chunk: 3,
            error: "boom".to_string(),
        };
        assert_eq!(failed.level(), EventLevel::Error);

        let started = LoadEvent::FileStarted {
            dataset: "sales".to_string(),
            file: PathBuf::from("/data/sales/part-0001"),
        };
        assert_eq!(started.level(), EventLevel::Info);
        assert!(EventLevel::Info < EventLevel::Error);
    }

    #[test]
    fn test_fields_and_display() {
        let event = LoadEvent::ChunkWritten {
            dataset: "sales".to_string(),
            file: PathBuf::from("part-0001"),
            chunk: 0,
            rows: 10,
        };

        assert_eq!(
            event.fields(),
            vec![
                ("dataset", "sales".to_string()),
                ("file", "part-0001".to_string()),
                ("chunk", "0".to_string()),
                ("rows", "10".to_string()),
            ]
        );
        assert_eq!(
            event.to_string(),
            "Chunk written dataset=sales file=part-0001 chunk=0 rows=10"
        );
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.record(&LoadEvent::Fatal {
            error: "first".to_string(),
        });
        sink.record(&LoadEvent::DatasetFailed {
            dataset: "sales".to_string(),
            error: "second".to_string(),
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], LoadEvent::Fatal { error } if error == "first"));
        assert_eq!(sink.count_level(EventLevel::Error), 2);
    }

    /// Buffer shared with a `fmt` subscriber
    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_sink_keeps_chunk_progress_at_info() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let file = PathBuf::from("part-0000");
        tracing::subscriber::with_default(subscriber, || {
            let sink = TracingSink;
            sink.record(&LoadEvent::ChunkStarted {
                dataset: "sales".to_string(),
                file: file.clone(),
                chunk: 0,
                rows: 2,
            });
            sink.record(&LoadEvent::ChunkWritten {
                dataset: "sales".to_string(),
                file: file.clone(),
                chunk: 0,
                rows: 2,
            });
            sink.record(&LoadEvent::ChunkFailed {
                dataset: "sales".to_string(),
                file: file.clone(),
                chunk: 1,
                error: "boom".to_string(),
            });
        });

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Processing chunk"));
        assert!(output.contains("Chunk written"));
        assert!(output.contains("Chunk failed, skipping"));
    }
}
