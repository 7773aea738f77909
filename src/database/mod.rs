//! Destination database abstraction
//!
//! Every chunk is appended to its destination table through the
//! [`TableWriter`] trait. Two backends implement it:
//! - PostgreSQL: bulk `COPY ... FROM STDIN` in CSV format
//! - DuckDB: embedded database, prepared inserts (file-based or in-memory)
//!
//! Both create the destination table on first use with one text column per
//! chunk column, and write each chunk inside a single transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ingest::TabularChunk;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod config;
pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

pub use config::{ConfigError, ConnectionDescriptor, DatabaseBackendType, LoaderConfig};
pub use schema::DestinationTable;

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Appending a chunk to its destination table failed
    #[error("Database write failed: {0}")]
    WriteFailed(String),

    /// The write did not complete within the configured timeout
    #[error("Database write timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested backend was not compiled in
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Number of rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Writes tabular chunks into destination tables
///
/// Implementations own their connection and reuse it for every call.
/// All operations are async; callers await them one at a time.
#[async_trait(?Send)]
pub trait TableWriter: Send + Sync {
    /// Append every row of `chunk` to `table`
    ///
    /// Creates the table when it does not exist. The chunk is written in
    /// full or not at all. Appending the same chunk twice duplicates rows.
    ///
    /// # Returns
    /// Number of rows written
    async fn append_chunk(&self, table: &str, chunk: &TabularChunk) -> DatabaseResult<u64>;

    /// Execute a SQL query and return results
    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult>;

    /// Check database connectivity
    async fn health_check(&self) -> DatabaseResult<bool> {
        let result = self.execute_query("SELECT 1 AS healthy").await?;
        Ok(!result.is_empty())
    }

    /// Get the backend type name
    fn backend_type(&self) -> &'static str;

    /// Close the database connection
    async fn close(&self) -> DatabaseResult<()>;
}

/// Open a writer for the backend named by the descriptor
///
/// PostgreSQL connects over the network; DuckDB opens `database` as a file
/// path.
pub async fn connect(descriptor: &ConnectionDescriptor) -> DatabaseResult<Box<dyn TableWriter>> {
    tracing::info!(
        backend = %descriptor.backend,
        url = %descriptor.masked_url(),
        "Connecting to database"
    );

    match descriptor.backend {
        #[cfg(feature = "postgres-backend")]
        DatabaseBackendType::Postgres => {
            Ok(Box::new(PostgresBackend::connect(descriptor).await?))
        }
        #[cfg(feature = "duckdb-backend")]
        DatabaseBackendType::DuckDB => Ok(Box::new(DuckDBBackend::new(&descriptor.database)?)),
        #[allow(unreachable_patterns)]
        other => Err(DatabaseError::BackendUnavailable(format!(
            "{} support was not compiled in",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_counts() {
        let result = QueryResult::new(
            vec!["healthy".to_string()],
            vec![serde_json::json!({"healthy": 1})],
        );
        assert_eq!(result.row_count(), 1);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_error_messages() {
        let err = DatabaseError::WriteFailed("relation is locked".to_string());
        assert_eq!(err.to_string(), "Database write failed: relation is locked");

        let err = DatabaseError::Timeout("30s elapsed".to_string());
        assert!(err.to_string().contains("timed out"));
    }
}
