//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dataset_loader::{DatabaseError, DatabaseResult, QueryResult, TableWriter, TabularChunk};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Records every appended chunk; fails the calls whose 0-based index is listed
#[derive(Default)]
pub struct RecordingWriter {
    fail_calls: Vec<usize>,
    calls: Mutex<usize>,
    written: Mutex<Vec<(String, TabularChunk)>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(fail_calls: &[usize]) -> Self {
        Self {
            fail_calls: fail_calls.to_vec(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn written(&self) -> Vec<(String, TabularChunk)> {
        self.written.lock().unwrap().clone()
    }

    pub fn tables(&self) -> Vec<String> {
        self.written().into_iter().map(|(table, _)| table).collect()
    }
}

#[async_trait(?Send)]
impl TableWriter for RecordingWriter {
    async fn append_chunk(&self, table: &str, chunk: &TabularChunk) -> DatabaseResult<u64> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            call
        };
        if self.fail_calls.contains(&call) {
            return Err(DatabaseError::WriteFailed(format!(
                "{}: simulated failure",
                table
            )));
        }
        self.written
            .lock()
            .unwrap()
            .push((table.to_string(), chunk.clone()));
        Ok(chunk.row_count() as u64)
    }

    async fn execute_query(&self, _sql: &str) -> DatabaseResult<QueryResult> {
        Ok(QueryResult::new(
            vec!["healthy".to_string()],
            vec![serde_json::json!({"healthy": 1})],
        ))
    }

    fn backend_type(&self) -> &'static str {
        "recording"
    }

    async fn close(&self) -> DatabaseResult<()> {
        Ok(())
    }
}

/// Source directory with a catalog and per-dataset `part-*` files
pub struct SourceDir {
    pub dir: TempDir,
}

impl SourceDir {
    pub fn new(catalog_json: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("schemas.json"), catalog_json).unwrap();
        Self { dir }
    }

    /// A source directory without `schemas.json`
    pub fn without_catalog() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_file(&self, dataset: &str, name: &str, content: &str) -> &Self {
        let dataset_dir = self.dir.path().join(dataset);
        fs::create_dir_all(&dataset_dir).unwrap();
        fs::write(dataset_dir.join(name), content).unwrap();
        self
    }
}

/// Catalog with `sales` ([id, name, amount] at positions 2, 0, 1) and `orders`
pub const SALES_AND_ORDERS: &str = r#"{
    "sales": [
        {"column_name": "id", "column_position": 2},
        {"column_name": "name", "column_position": 0},
        {"column_name": "amount", "column_position": 1}
    ],
    "orders": [
        {"column_name": "order_id", "column_position": 1},
        {"column_name": "status", "column_position": 2}
    ]
}"#;

/// `count` three-field rows
pub fn sales_rows(count: usize) -> String {
    (0..count)
        .map(|i| format!("name{},{},{}\n", i, i, i * 100))
        .collect()
}

/// `count` two-field rows
pub fn order_rows(count: usize) -> String {
    (0..count).map(|i| format!("{},shipped\n", i)).collect()
}
