//! Error types for chunked reads and dataset loads

use std::path::PathBuf;

use crate::catalog::CatalogError;

/// Errors raised while iterating over the chunks of a source file
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The file does not exist when iteration starts
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A row does not match the expected column count or the CSV grammar
    #[error("Unable to parse data from {} (chunk {chunk}, line {line}): {error}", .path.display())]
    Parse {
        path: PathBuf,
        chunk: usize,
        line: u64,
        error: String,
    },

    /// Any other I/O or decoding failure
    #[error("Unexpected error reading {} (chunk {chunk}): {error}", .path.display())]
    UnexpectedRead {
        path: PathBuf,
        chunk: usize,
        error: String,
    },
}

impl ReadError {
    /// Whether the reader can continue with the next chunk after this error
    pub fn is_chunk_local(&self) -> bool {
        matches!(self, ReadError::Parse { .. })
    }

    /// Chunk index the error belongs to, if any chunk was reached
    pub fn chunk(&self) -> Option<usize> {
        match self {
            ReadError::FileNotFound(_) => None,
            ReadError::Parse { chunk, .. } | ReadError::UnexpectedRead { chunk, .. } => {
                Some(*chunk)
            }
        }
    }
}

/// Errors that end the load of a single dataset
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The dataset's columns could not be resolved from the catalog
    #[error(transparent)]
    Schema(#[from] CatalogError),

    /// No `part-*` files exist for the dataset
    #[error("No files found for dataset {dataset} at {}", .dir.display())]
    NoSourceFiles { dataset: String, dir: PathBuf },

    /// The discovery pattern could not be built
    #[error("Invalid file pattern {pattern}: {error}")]
    InvalidPattern { pattern: String, error: String },

    /// A chunk failed while the abort policy was active
    #[error("Chunk {chunk} of {} failed for dataset {dataset}: {error}", .file.display())]
    ChunkFailed {
        dataset: String,
        file: PathBuf,
        chunk: usize,
        error: String,
    },

    /// A file failed while the abort policy was active
    #[error("File {} failed for dataset {dataset}: {error}", .file.display())]
    FileFailed {
        dataset: String,
        file: PathBuf,
        error: String,
    },
}
