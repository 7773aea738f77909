//! Chunked reader for headerless CSV source files
//!
//! A [`ChunkReader`] streams a file in bounded chunks instead of loading it
//! into memory. The file is opened on the first call to `next()`, so every
//! error surfaces at the point the affected chunk is requested.

use std::fs::File;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::StringRecord;

use super::error::ReadError;

/// Upper bound for the rows preallocated per chunk
const MAX_PREALLOCATED_ROWS: usize = 4096;

/// An in-memory slice of a source file
///
/// Holds at most `chunk_size` rows, each with exactly one value per column.
/// Column names come from the schema catalog since the files carry no header.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularChunk {
    columns: Arc<[String]>,
    rows: Vec<Vec<String>>,
}

impl TabularChunk {
    /// Create a chunk from column names and rows
    pub fn new(columns: Arc<[String]>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Column names in resolved order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw row values, in column order
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), value.clone().into()))
                    .collect();
                serde_json::Value::Object(map)
            })
            .collect()
    }
}

enum ReaderState {
    Pending,
    Open(csv::Reader<File>),
    Done,
}

/// Lazy, single-pass iterator over the chunks of one file
///
/// Yields `(chunk index, chunk)` pairs. A parse error is reported for the
/// chunk it occurs in; the rest of that chunk's rows are discarded and
/// iteration continues with the next chunk. `FileNotFound` and
/// `UnexpectedRead` end the iteration.
pub struct ChunkReader {
    path: PathBuf,
    columns: Arc<[String]>,
    chunk_size: usize,
    next_index: usize,
    state: ReaderState,
}

/// Read a file in chunks of at most `chunk_size` rows
///
/// # Arguments
/// * `path` - Comma-delimited file without a header row
/// * `columns` - Resolved column names, one per field
/// * `chunk_size` - Maximum rows per chunk
pub fn read_chunks(
    path: impl AsRef<Path>,
    columns: impl Into<Arc<[String]>>,
    chunk_size: NonZeroUsize,
) -> ChunkReader {
    ChunkReader {
        path: path.as_ref().to_path_buf(),
        columns: columns.into(),
        chunk_size: chunk_size.get(),
        next_index: 0,
        state: ReaderState::Pending,
    }
}

impl ChunkReader {
    fn open(&self) -> Result<csv::Reader<File>, ReadError> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ReadError::FileNotFound(self.path.clone()),
            _ => ReadError::UnexpectedRead {
                path: self.path.clone(),
                chunk: self.next_index,
                error: e.to_string(),
            },
        })?;

        tracing::debug!(
            path = %self.path.display(),
            columns = ?self.columns,
            "Reading CSV"
        );

        Ok(csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file))
    }

    fn parse_error(&self, line: u64, error: String) -> ReadError {
        ReadError::Parse {
            path: self.path.clone(),
            chunk: self.next_index,
            line,
            error,
        }
    }
}

impl Iterator for ChunkReader {
    type Item = Result<(usize, TabularChunk), ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, ReaderState::Pending) {
            match self.open() {
                Ok(reader) => self.state = ReaderState::Open(reader),
                Err(e) => {
                    self.state = ReaderState::Done;
                    return Some(Err(e));
                }
            }
        }

        let index = self.next_index;
        let expected = self.columns.len();
        let mut rows = Vec::with_capacity(self.chunk_size.min(MAX_PREALLOCATED_ROWS));
        let mut record = StringRecord::new();
        let mut consumed = 0;
        let mut failure: Option<ReadError> = None;

        while consumed < self.chunk_size {
            let ReaderState::Open(reader) = &mut self.state else {
                return None;
            };

            match reader.read_record(&mut record) {
                Ok(true) => {
                    consumed += 1;
                    if failure.is_some() {
                        continue;
                    }
                    if record.len() != expected {
                        let line = record.position().map(|p| p.line()).unwrap_or(0);
                        failure = Some(self.parse_error(
                            line,
                            format!("expected {} fields, found {}", expected, record.len()),
                        ));
                        continue;
                    }
                    rows.push(record.iter().map(str::to_string).collect());
                }
                Ok(false) => break,
                Err(e) => match e.kind() {
                    csv::ErrorKind::Io(_) | csv::ErrorKind::Utf8 { .. } => {
                        let error = ReadError::UnexpectedRead {
                            path: self.path.clone(),
                            chunk: index,
                            error: e.to_string(),
                        };
                        self.state = ReaderState::Done;
                        return Some(Err(error));
                    }
                    _ => {
                        consumed += 1;
                        if failure.is_none() {
                            let line = e.position().map(|p| p.line()).unwrap_or(0);
                            failure = Some(self.parse_error(line, e.to_string()));
                        }
                    }
                },
            }
        }

        if consumed == 0 {
            self.state = ReaderState::Done;
            return None;
        }

        self.next_index += 1;

        match failure {
            Some(error) => Some(Err(error)),
            None => Some(Ok((index, TabularChunk::new(self.columns.clone(), rows)))),
        }
    }
}
