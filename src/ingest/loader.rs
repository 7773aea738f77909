//! Dataset loading
//!
//! Loads every `part-*` file of one dataset into `<dataset><suffix>`, one
//! chunk at a time. A chunk that fails to parse or write is recorded and
//! skipped; a file that cannot be read to the end is recorded and the next
//! file is processed. [`ChunkErrorPolicy::Abort`] turns either into an error.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::{LoadError, ReadError};
use super::reader::{TabularChunk, read_chunks};
use super::stats::{ChunkFailure, DatasetReport};
use crate::catalog::{DEFAULT_SORT_KEY, SchemaCatalog, resolve_columns};
use crate::database::{DatabaseError, DatabaseResult, TableWriter};
use crate::events::{EventSink, LoadEvent};

/// Default number of rows per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default suffix appended to the dataset name to form the table name
pub const DEFAULT_TABLE_SUFFIX: &str = "_test";

/// File name prefix of source files inside a dataset directory
pub const SOURCE_FILE_PREFIX: &str = "part-";

/// What to do when a chunk or file fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkErrorPolicy {
    /// Record the failure and continue (default)
    #[default]
    Skip,
    /// Stop loading the dataset at the first failure
    Abort,
}

/// Options for loading one dataset
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Maximum rows per chunk
    pub chunk_size: NonZeroUsize,
    /// Suffix appended to the dataset name to form the table name
    pub table_suffix: String,
    /// Descriptor field used to order columns
    pub sort_key: String,
    /// Maximum time a single chunk write may take
    ///
    /// Only writers that yield while waiting on the database can be timed
    /// out. The DuckDB backend writes synchronously, so the limit applies to
    /// PostgreSQL only.
    pub write_timeout: Option<Duration>,
    /// Policy for chunk and file failures
    pub on_chunk_error: ChunkErrorPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            chunk_size: NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            table_suffix: DEFAULT_TABLE_SUFFIX.to_string(),
            sort_key: DEFAULT_SORT_KEY.to_string(),
            write_timeout: None,
            on_chunk_error: ChunkErrorPolicy::default(),
        }
    }
}

impl LoadOptions {
    /// Destination table for a dataset
    pub fn table_name(&self, dataset: &str) -> String {
        format!("{}{}", dataset, self.table_suffix)
    }
}

/// Find the source files of a dataset
///
/// Matches `<base_dir>/<dataset>/part-*`, keeps regular files only and sorts
/// them by path.
pub fn discover_source_files(base_dir: &Path, dataset: &str) -> Result<Vec<PathBuf>, LoadError> {
    let dir = base_dir.join(dataset);
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        SOURCE_FILE_PREFIX
    );

    let entries = glob::glob(&pattern).map_err(|e| LoadError::InvalidPattern {
        pattern: pattern.clone(),
        error: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                // Log but continue
                tracing::warn!(dataset, error = %e, "Error accessing path");
            }
        }
    }

    if files.is_empty() {
        return Err(LoadError::NoSourceFiles {
            dataset: dataset.to_string(),
            dir,
        });
    }

    files.sort();
    Ok(files)
}

/// Load every source file of a dataset
///
/// # Arguments
/// * `base_dir` - Directory holding one subdirectory per dataset
/// * `catalog` - Schema catalog used to resolve the dataset's columns
/// * `writer` - Destination database
/// * `dataset` - Dataset name
/// * `options` - Chunk size, table suffix, timeout and failure policy
/// * `sink` - Receives progress and failure events
///
/// # Returns
/// A report of what was written and what was skipped. Schema errors and a
/// missing source directory fail the dataset before anything is written.
pub async fn load_dataset(
    base_dir: &Path,
    catalog: &SchemaCatalog,
    writer: &dyn TableWriter,
    dataset: &str,
    options: &LoadOptions,
    sink: &dyn EventSink,
) -> Result<DatasetReport, LoadError> {
    let start = Instant::now();

    let columns: Arc<[String]> = resolve_columns(catalog, dataset, &options.sort_key)?.into();
    let files = discover_source_files(base_dir, dataset)?;
    let table = options.table_name(dataset);

    sink.record(&LoadEvent::DatasetStarted {
        dataset: dataset.to_string(),
        table: table.clone(),
        columns: columns.len(),
        files: files.len(),
    });

    let mut load = DatasetLoad {
        dataset,
        columns,
        writer,
        options,
        sink,
        report: DatasetReport::new(dataset, table),
    };

    for file in &files {
        load.load_file(file).await?;
    }

    let mut report = load.report;
    report.duration = start.elapsed();

    sink.record(&LoadEvent::DatasetFinished {
        dataset: dataset.to_string(),
        files: report.files_processed + report.files_failed,
        chunks_written: report.chunks_written,
        chunks_failed: report.chunks_failed,
        rows_written: report.rows_written,
    });

    Ok(report)
}

/// State of one dataset load
struct DatasetLoad<'a> {
    dataset: &'a str,
    columns: Arc<[String]>,
    writer: &'a dyn TableWriter,
    options: &'a LoadOptions,
    sink: &'a dyn EventSink,
    report: DatasetReport,
}

impl DatasetLoad<'_> {
    async fn load_file(&mut self, file: &Path) -> Result<(), LoadError> {
        self.sink.record(&LoadEvent::FileStarted {
            dataset: self.dataset.to_string(),
            file: file.to_path_buf(),
        });

        for item in read_chunks(file, self.columns.clone(), self.options.chunk_size) {
            match item {
                Ok((index, chunk)) => self.write(file, index, &chunk).await?,
                Err(e) => match e.chunk() {
                    Some(index) if e.is_chunk_local() => {
                        self.chunk_failed(file, index, e.to_string())?
                    }
                    _ => return self.file_failed(file, e),
                },
            }
        }

        self.report.files_processed += 1;
        Ok(())
    }

    async fn write(
        &mut self,
        file: &Path,
        index: usize,
        chunk: &TabularChunk,
    ) -> Result<(), LoadError> {
        self.sink.record(&LoadEvent::ChunkStarted {
            dataset: self.dataset.to_string(),
            file: file.to_path_buf(),
            chunk: index,
            rows: chunk.row_count(),
        });

        let result = write_with_timeout(
            self.writer,
            &self.report.table,
            chunk,
            self.options.write_timeout,
        )
        .await;

        match result {
            Ok(rows) => {
                self.report.chunks_written += 1;
                self.report.rows_written += rows;
                self.sink.record(&LoadEvent::ChunkWritten {
                    dataset: self.dataset.to_string(),
                    file: file.to_path_buf(),
                    chunk: index,
                    rows,
                });
                Ok(())
            }
            Err(e) => self.chunk_failed(file, index, e.to_string()),
        }
    }

    fn chunk_failed(&mut self, file: &Path, index: usize, error: String) -> Result<(), LoadError> {
        self.report.chunks_failed += 1;
        self.report.add_failure(ChunkFailure {
            file: file.to_path_buf(),
            chunk: Some(index),
            error: error.clone(),
        });
        self.sink.record(&LoadEvent::ChunkFailed {
            dataset: self.dataset.to_string(),
            file: file.to_path_buf(),
            chunk: index,
            error: error.clone(),
        });

        match self.options.on_chunk_error {
            ChunkErrorPolicy::Skip => Ok(()),
            ChunkErrorPolicy::Abort => Err(LoadError::ChunkFailed {
                dataset: self.dataset.to_string(),
                file: file.to_path_buf(),
                chunk: index,
                error,
            }),
        }
    }

    fn file_failed(&mut self, file: &Path, error: ReadError) -> Result<(), LoadError> {
        let message = error.to_string();

        self.report.files_failed += 1;
        self.report.add_failure(ChunkFailure {
            file: file.to_path_buf(),
            chunk: error.chunk(),
            error: message.clone(),
        });
        self.sink.record(&LoadEvent::FileFailed {
            dataset: self.dataset.to_string(),
            file: file.to_path_buf(),
            error: message.clone(),
        });

        match self.options.on_chunk_error {
            ChunkErrorPolicy::Skip => Ok(()),
            ChunkErrorPolicy::Abort => Err(LoadError::FileFailed {
                dataset: self.dataset.to_string(),
                file: file.to_path_buf(),
                error: message,
            }),
        }
    }
}

/// Append a chunk, giving up after `timeout` when one is set
async fn write_with_timeout(
    writer: &dyn TableWriter,
    table: &str,
    chunk: &TabularChunk,
    timeout: Option<Duration>,
) -> DatabaseResult<u64> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, writer.append_chunk(table, chunk))
            .await
            .map_err(|_| {
                DatabaseError::Timeout(format!(
                    "{} chunk not written within {}ms",
                    table,
                    limit.as_millis()
                ))
            })?,
        None => writer.append_chunk(table, chunk).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryResult;
    use crate::events::{EventLevel, MemorySink};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records appended chunks; fails the calls whose 0-based index is listed
    #[derive(Default)]
    struct ScriptedWriter {
        fail_calls: Vec<usize>,
        calls: Mutex<usize>,
        written: Mutex<Vec<(String, TabularChunk)>>,
    }

    impl ScriptedWriter {
        fn failing(fail_calls: &[usize]) -> Self {
            Self {
                fail_calls: fail_calls.to_vec(),
                ..Default::default()
            }
        }

        fn written(&self) -> Vec<(String, TabularChunk)> {
            self.written.lock().unwrap().clone()
        }
    }

    #[async_trait(?Send)]
    impl TableWriter for ScriptedWriter {
        async fn append_chunk(&self, table: &str, chunk: &TabularChunk) -> DatabaseResult<u64> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let call = *calls;
                *calls += 1;
                call
            };
            if self.fail_calls.contains(&call) {
                return Err(DatabaseError::WriteFailed("connection reset".to_string()));
            }
            self.written
                .lock()
                .unwrap()
                .push((table.to_string(), chunk.clone()));
            Ok(chunk.row_count() as u64)
        }

        async fn execute_query(&self, _sql: &str) -> DatabaseResult<QueryResult> {
            Ok(QueryResult::new(Vec::new(), Vec::new()))
        }

        fn backend_type(&self) -> &'static str {
            "scripted"
        }

        async fn close(&self) -> DatabaseResult<()> {
            Ok(())
        }
    }

    /// Never completes a write
    struct StalledWriter;

    #[async_trait(?Send)]
    impl TableWriter for StalledWriter {
        async fn append_chunk(&self, _table: &str, _chunk: &TabularChunk) -> DatabaseResult<u64> {
            std::future::pending::<()>().await;
            Ok(0)
        }

        async fn execute_query(&self, _sql: &str) -> DatabaseResult<QueryResult> {
            Ok(QueryResult::new(Vec::new(), Vec::new()))
        }

        fn backend_type(&self) -> &'static str {
            "stalled"
        }

        async fn close(&self) -> DatabaseResult<()> {
            Ok(())
        }
    }

    fn setup(files: &[(&str, &str)]) -> (TempDir, SchemaCatalog) {
        let dir = TempDir::new().unwrap();
        let catalog_json = r#"{"sales": [
            {"column_name": "id", "column_position": 2},
            {"column_name": "name", "column_position": 0},
            {"column_name": "amount", "column_position": 1}
        ]}"#;
        fs::write(dir.path().join("schemas.json"), catalog_json).unwrap();

        let dataset_dir = dir.path().join("sales");
        fs::create_dir_all(&dataset_dir).unwrap();
        for (name, content) in files {
            fs::write(dataset_dir.join(name), content).unwrap();
        }

        let catalog = SchemaCatalog::load(dir.path()).unwrap();
        (dir, catalog)
    }

    fn options(chunk_size: usize) -> LoadOptions {
        LoadOptions {
            chunk_size: NonZeroUsize::new(chunk_size).unwrap(),
            ..Default::default()
        }
    }

    fn rows(count: usize) -> String {
        (0..count).map(|i| format!("n{i},{i},{}\n", i * 100)).collect()
    }

    fn chunk_failures(sink: &MemorySink) -> usize {
        sink.events()
            .iter()
            .filter(|e| matches!(e, LoadEvent::ChunkFailed { .. }))
            .count()
    }

    #[test]
    fn test_discover_source_files_sorted() {
        let (dir, _) = setup(&[("part-0002", "x"), ("part-0001", "x"), ("notes.txt", "x")]);
        fs::create_dir(dir.path().join("sales").join("part-dir")).unwrap();

        let files = discover_source_files(dir.path(), "sales").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["part-0001", "part-0002"]);
    }

    #[test]
    fn test_discover_no_source_files() {
        let (dir, _) = setup(&[("readme.md", "x")]);

        let err = discover_source_files(dir.path(), "sales").unwrap_err();
        assert!(matches!(err, LoadError::NoSourceFiles { ref dataset, .. } if dataset == "sales"));

        let err = discover_source_files(dir.path(), "refunds").unwrap_err();
        assert!(matches!(err, LoadError::NoSourceFiles { .. }));
    }

    #[test]
    fn test_discover_escapes_directory_name() {
        let dir = TempDir::new().unwrap();
        let dataset_dir = dir.path().join("odd[1]");
        fs::create_dir_all(&dataset_dir).unwrap();
        fs::write(dataset_dir.join("part-0000"), "a").unwrap();

        let files = discover_source_files(dir.path(), "odd[1]").unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_table_name() {
        let mut options = LoadOptions::default();
        assert_eq!(options.table_name("sales"), "sales_test");
        options.table_suffix = "_raw".to_string();
        assert_eq!(options.table_name("sales"), "sales_raw");
    }

    #[tokio::test]
    async fn test_load_all_chunks() {
        let (dir, catalog) = setup(&[("part-0000", &rows(5)), ("part-0001", &rows(3))]);
        let writer = ScriptedWriter::default();
        let sink = MemorySink::new();

        let report = load_dataset(dir.path(), &catalog, &writer, "sales", &options(2), &sink)
            .await
            .unwrap();

        assert_eq!(report.table, "sales_test");
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.chunks_written, 5);
        assert_eq!(report.rows_written, 8);
        assert!(report.is_complete());

        let written = writer.written();
        assert!(written.iter().all(|(table, _)| table == "sales_test"));
        assert_eq!(written[0].1.columns(), ["name", "amount", "id"]);
    }

    #[tokio::test]
    async fn test_every_chunk_reported_at_info() {
        let (dir, catalog) = setup(&[("part-0000", &rows(3))]);
        let writer = ScriptedWriter::default();
        let sink = MemorySink::new();

        load_dataset(dir.path(), &catalog, &writer, "sales", &options(2), &sink)
            .await
            .unwrap();

        let file_events: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    LoadEvent::FileStarted { .. }
                        | LoadEvent::ChunkStarted { .. }
                        | LoadEvent::ChunkWritten { .. }
                )
            })
            .collect();

        assert!(matches!(&file_events[0], LoadEvent::FileStarted { .. }));
        assert!(matches!(
            &file_events[1],
            LoadEvent::ChunkStarted { chunk: 0, rows: 2, .. }
        ));
        assert!(matches!(
            &file_events[2],
            LoadEvent::ChunkWritten { chunk: 0, rows: 2, .. }
        ));
        assert!(matches!(
            &file_events[3],
            LoadEvent::ChunkStarted { chunk: 1, rows: 1, .. }
        ));
        assert!(matches!(
            &file_events[4],
            LoadEvent::ChunkWritten { chunk: 1, rows: 1, .. }
        ));
        assert_eq!(file_events.len(), 5);
        assert!(file_events.iter().all(|e| e.level() == EventLevel::Info));
    }

    #[tokio::test]
    async fn test_middle_chunk_write_failure_is_isolated() {
        let (dir, catalog) = setup(&[("part-0000", &rows(6)), ("part-0001", &rows(4))]);
        // 3 chunks in the first file, 2 in the second; fail the second call
        let writer = ScriptedWriter::failing(&[1]);
        let sink = MemorySink::new();

        let report = load_dataset(dir.path(), &catalog, &writer, "sales", &options(2), &sink)
            .await
            .unwrap();

        assert_eq!(writer.written().len(), 4);
        assert_eq!(report.chunks_written, 4);
        assert_eq!(report.chunks_failed, 1);
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.failures[0].chunk, Some(1));
        assert_eq!(chunk_failures(&sink), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_skips_chunk_only() {
        let content = "a,1,100\nb,2,200\nc,3\nd,4,400\ne,5,500\n";
        let (dir, catalog) = setup(&[("part-0000", content)]);
        let writer = ScriptedWriter::default();
        let sink = MemorySink::new();

        let report = load_dataset(dir.path(), &catalog, &writer, "sales", &options(2), &sink)
            .await
            .unwrap();

        // Chunk 1 holds the short row and is dropped as a whole
        assert_eq!(report.chunks_written, 2);
        assert_eq!(report.chunks_failed, 1);
        assert_eq!(report.rows_written, 3);
        assert_eq!(chunk_failures(&sink), 1);
    }

    #[tokio::test]
    async fn test_abort_policy_stops_at_first_failure() {
        let (dir, catalog) = setup(&[("part-0000", &rows(6)), ("part-0001", &rows(4))]);
        let writer = ScriptedWriter::failing(&[1]);
        let sink = MemorySink::new();
        let options = LoadOptions {
            on_chunk_error: ChunkErrorPolicy::Abort,
            ..options(2)
        };

        let err = load_dataset(dir.path(), &catalog, &writer, "sales", &options, &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::ChunkFailed { chunk: 1, .. }));
        assert_eq!(writer.written().len(), 1);
    }

    #[tokio::test]
    async fn test_no_source_files_means_no_writes() {
        let (dir, catalog) = setup(&[]);
        let writer = ScriptedWriter::default();
        let sink = MemorySink::new();

        let err = load_dataset(dir.path(), &catalog, &writer, "sales", &options(2), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::NoSourceFiles { .. }));
        assert!(writer.written().is_empty());
    }

    #[tokio::test]
    async fn test_schema_error_means_no_writes() {
        let (dir, catalog) = setup(&[("part-0000", &rows(2))]);
        let writer = ScriptedWriter::default();
        let sink = MemorySink::new();

        let err = load_dataset(dir.path(), &catalog, &writer, "refunds", &options(2), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Schema(_)));
        assert!(writer.written().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let (dir, catalog) = setup(&[("part-0000", &rows(2))]);
        fs::write(dir.path().join("sales").join("part-0001"), b"a,1,\xff\xfe\n").unwrap();
        fs::write(dir.path().join("sales").join("part-0002"), rows(2)).unwrap();
        let writer = ScriptedWriter::default();
        let sink = MemorySink::new();

        let report = load_dataset(dir.path(), &catalog, &writer, "sales", &options(5), &sink)
            .await
            .unwrap();

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.chunks_written, 2);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            LoadEvent::FileFailed { file, .. } if file.ends_with("part-0001")
        )));
    }

    #[tokio::test]
    async fn test_write_timeout_counts_as_failed_chunk() {
        let (dir, catalog) = setup(&[("part-0000", &rows(2))]);
        let sink = MemorySink::new();
        let options = LoadOptions {
            write_timeout: Some(Duration::from_millis(20)),
            ..options(1)
        };

        let report = load_dataset(dir.path(), &catalog, &StalledWriter, "sales", &options, &sink)
            .await
            .unwrap();

        assert_eq!(report.chunks_failed, 2);
        assert!(report.failures[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_file_writes_nothing() {
        let (dir, catalog) = setup(&[("part-0000", "")]);
        let writer = ScriptedWriter::default();
        let sink = MemorySink::new();

        let report = load_dataset(dir.path(), &catalog, &writer, "sales", &options(2), &sink)
            .await
            .unwrap();

        assert_eq!(report.files_processed, 1);
        assert_eq!(report.chunks_written, 0);
        assert!(writer.written().is_empty());
    }

    #[test]
    fn test_default_options() {
        let options = LoadOptions::default();
        assert_eq!(options.chunk_size.get(), DEFAULT_CHUNK_SIZE);
        assert_eq!(options.sort_key, DEFAULT_SORT_KEY);
        assert_eq!(options.on_chunk_error, ChunkErrorPolicy::Skip);
        assert!(options.write_timeout.is_none());
    }
}
