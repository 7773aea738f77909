//! PostgreSQL database backend implementation
//!
//! Chunks are streamed with `COPY ... FROM STDIN` in CSV format, so the
//! server coerces text values to the column types of pre-existing tables.

use async_trait::async_trait;
use bytes::Bytes;
use csv::QuoteStyle;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::config::ConnectionDescriptor;
use super::schema::DestinationTable;
use super::{DatabaseError, DatabaseResult, QueryResult, TableWriter};
use crate::ingest::TabularChunk;

/// PostgreSQL database backend
pub struct PostgresBackend {
    /// Connection URL with the password masked
    masked_url: String,
    /// PostgreSQL client (wrapped for async access)
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl PostgresBackend {
    /// Connect using the given descriptor
    ///
    /// The connection task is spawned on the current tokio runtime.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> DatabaseResult<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .user(&descriptor.user)
            .password(&descriptor.password)
            .host(&descriptor.host)
            .port(descriptor.port)
            .dbname(&descriptor.database);

        let (client, connection) = config.connect(tokio_postgres::NoTls).await.map_err(|e| {
            DatabaseError::ConnectionFailed(format!(
                "Failed to connect to PostgreSQL at {}: {}",
                descriptor.masked_url(),
                e
            ))
        })?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self {
            masked_url: descriptor.masked_url(),
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Convert a PostgreSQL row to a JSON value
    fn row_to_json(row: &tokio_postgres::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value = Self::get_column_value(row, i);
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Get a column value as JSON
    fn get_column_value(row: &tokio_postgres::Row, idx: usize) -> serde_json::Value {
        // Try different types
        if let Ok(v) = row.try_get::<_, Option<String>>(idx) {
            return v
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<bool>>(idx) {
            return v
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
            return v
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }

        serde_json::Value::Null
    }
}

/// A line holding only this sequence ends `COPY` data
const END_OF_DATA_MARKER: &str = "\\.";

/// Encode the rows of a chunk as a CSV payload for `COPY`
///
/// Empty fields are written unquoted, which `COPY` reads as NULL. A row that
/// would encode to the end-of-data marker is quoted.
pub(crate) fn encode_copy_payload(chunk: &TabularChunk) -> DatabaseResult<Vec<u8>> {
    let mut payload = Vec::new();
    let mut writer = copy_writer(QuoteStyle::Necessary);

    for row in chunk.rows() {
        if row.len() == 1 && row[0] == END_OF_DATA_MARKER {
            payload.extend(finish_payload(writer)?);

            let mut quoted = copy_writer(QuoteStyle::Always);
            quoted.write_record(row).map_err(encoding_failed)?;
            payload.extend(finish_payload(quoted)?);

            writer = copy_writer(QuoteStyle::Necessary);
        } else {
            writer.write_record(row).map_err(encoding_failed)?;
        }
    }

    payload.extend(finish_payload(writer)?);
    Ok(payload)
}

fn copy_writer(style: QuoteStyle) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(style)
        .from_writer(Vec::new())
}

fn finish_payload(writer: csv::Writer<Vec<u8>>) -> DatabaseResult<Vec<u8>> {
    writer.into_inner().map_err(|e| encoding_failed(e.into_error()))
}

fn encoding_failed(e: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::InvalidInput(format!("CSV encoding failed: {}", e))
}

#[async_trait(?Send)]
impl TableWriter for PostgresBackend {
    async fn append_chunk(&self, table: &str, chunk: &TabularChunk) -> DatabaseResult<u64> {
        if chunk.is_empty() {
            return Err(DatabaseError::InvalidInput(format!(
                "Refusing to append an empty chunk to {}",
                table
            )));
        }

        let destination = DestinationTable::new(table, chunk.columns());
        let payload = encode_copy_payload(chunk)?;
        let write_failed =
            |e: tokio_postgres::Error| DatabaseError::WriteFailed(format!("{}: {}", table, e));

        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(write_failed)?;

        tx.batch_execute(&destination.create_table_sql())
            .await
            .map_err(write_failed)?;

        let copy_sql = destination.copy_in_sql();
        let sink = tx
            .copy_in::<_, Bytes>(copy_sql.as_str())
            .await
            .map_err(write_failed)?;
        let mut sink = std::pin::pin!(sink);
        sink.send(Bytes::from(payload))
            .await
            .map_err(write_failed)?;
        let rows = sink.as_mut().finish().await.map_err(write_failed)?;

        tx.commit().await.map_err(write_failed)?;

        Ok(rows)
    }

    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        let start = std::time::Instant::now();
        let client = self.client.lock().await;

        let rows = client
            .query(sql, &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let columns: Vec<String> = if !rows.is_empty() {
            rows[0]
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        } else {
            Vec::new()
        };

        let json_rows: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| Self::row_to_json(row, &columns))
            .collect();

        Ok(QueryResult {
            columns,
            rows: json_rows,
            rows_affected: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // PostgreSQL connection is closed when client is dropped
        tracing::debug!(url = %self.masked_url, "Closing PostgreSQL connection");
        Ok(())
    }
}
