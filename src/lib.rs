//! Dataset Loader - bulk loading of headerless CSV exports into database tables
//!
//! Provides:
//! - Schema catalog loading and column order resolution (`schemas.json`)
//! - Lazy, bounded-size chunk reading of `part-*` source files
//! - Table writers for PostgreSQL (`COPY`) and DuckDB
//! - Per-dataset loading with chunk-level failure isolation
//! - Run orchestration over one or more datasets
//!
//! Progress and failures are reported through an injected
//! [`events::EventSink`]; the binary forwards them to `tracing`.

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod database;
pub mod events;
pub mod ingest;
pub mod orchestrator;

pub use catalog::{CATALOG_FILENAME, CatalogError, DEFAULT_SORT_KEY, SchemaCatalog, resolve_columns};
pub use database::{
    ConnectionDescriptor, DatabaseBackendType, DatabaseError, DatabaseResult, LoaderConfig,
    QueryResult, TableWriter,
};
pub use events::{EventLevel, EventSink, LoadEvent, MemorySink, TracingSink};
pub use ingest::{
    ChunkErrorPolicy, ChunkFailure, ChunkReader, DatasetReport, LoadError, LoadOptions, ReadError,
    TabularChunk, discover_source_files, load_dataset, read_chunks,
};
pub use orchestrator::{
    DatasetErrorPolicy, DatasetFailure, DatasetSelector, RunError, RunOptions, RunReport,
    load_catalog, run, run_from_dir,
};
