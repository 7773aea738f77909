//! Chunked ingestion of headerless CSV source files
//!
//! - [`reader`]: lazy, bounded-size chunk iteration over one file
//! - [`loader`]: discovery of a dataset's `part-*` files and chunk-by-chunk
//!   loading into its destination table
//!
//! # Example
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use dataset_loader::ingest::read_chunks;
//!
//! let columns = vec!["name".to_string(), "amount".to_string()];
//! let chunk_size = NonZeroUsize::new(10_000).unwrap();
//! for item in read_chunks("exports/sales/part-00000", columns, chunk_size) {
//!     let (index, chunk) = item?;
//!     println!("chunk {} has {} rows", index, chunk.row_count());
//! }
//! # Ok::<(), dataset_loader::ingest::ReadError>(())
//! ```

mod error;
pub mod loader;
pub mod reader;
mod stats;

pub use error::{LoadError, ReadError};
pub use loader::{
    ChunkErrorPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_TABLE_SUFFIX, LoadOptions, SOURCE_FILE_PREFIX,
    discover_source_files, load_dataset,
};
pub use reader::{ChunkReader, TabularChunk, read_chunks};
pub(crate) use stats::serialize_secs;
pub use stats::{ChunkFailure, DatasetReport, MAX_RECORDED_FAILURES, format_duration};
