//! Schema catalog loading and column resolution
//!
//! The catalog is a single JSON document, `schemas.json`, stored at the root of
//! the source directory. Each top-level key names a dataset and maps to the list
//! of column descriptors for that dataset:
//!
//! ```json
//! {
//!   "orders": [
//!     { "column_name": "order_id", "column_position": 1 },
//!     { "column_name": "order_date", "column_position": 2 }
//!   ]
//! }
//! ```
//!
//! Loading only checks that the document is structurally sound. Descriptor
//! fields are validated per dataset by [`resolve_columns`], so a broken entry
//! for one dataset does not prevent the others from loading.

mod resolver;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

pub use resolver::{ColumnDescriptor, resolve_columns, validate_descriptors};

/// File name of the schema catalog inside the source directory
pub const CATALOG_FILENAME: &str = "schemas.json";

/// Descriptor field holding the column name
pub const COLUMN_NAME_FIELD: &str = "column_name";

/// Default descriptor field used to order columns
pub const DEFAULT_SORT_KEY: &str = "column_position";

/// A column descriptor as it appears in the catalog, before validation
pub type RawDescriptor = Map<String, Value>;

/// Errors raised while loading the catalog or resolving a dataset's columns
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// `schemas.json` does not exist at the expected location
    #[error("Unable to load schema: {} does not exist", .0.display())]
    ConfigNotFound(PathBuf),

    /// The catalog is not well-formed JSON or has the wrong shape
    #[error("Unable to parse schema catalog {}: {error}", .path.display())]
    ConfigParseError { path: PathBuf, error: String },

    /// The catalog exists but could not be read
    #[error("Failed to read schema catalog {}: {error}", .path.display())]
    Io { path: PathBuf, error: String },

    /// The dataset, the sort key or the column name is missing
    #[error("Malformed schema for dataset '{dataset}': missing '{field}'")]
    SchemaFieldMissing { dataset: String, field: String },

    /// A required field is present but holds the wrong kind of value
    #[error("Malformed schema for dataset '{dataset}': field '{field}' {reason}")]
    InvalidField {
        dataset: String,
        field: String,
        reason: String,
    },

    /// The dataset is present but lists no columns
    #[error("Schema for dataset '{0}' has no columns")]
    EmptySchema(String),
}

/// The column layout of one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    /// Dataset name (top-level key of the catalog)
    pub name: String,
    /// Descriptors in catalog order
    pub descriptors: Vec<RawDescriptor>,
}

/// Parsed schema catalog
///
/// Datasets keep the order in which they appear in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaCatalog {
    datasets: Vec<DatasetSchema>,
}

impl SchemaCatalog {
    /// Load `schemas.json` from the given base directory
    pub fn load(base_dir: &Path) -> Result<Self, CatalogError> {
        let path = base_dir.join(CATALOG_FILENAME);

        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CatalogError::ConfigNotFound(path.clone()),
            ErrorKind::InvalidData => CatalogError::ConfigParseError {
                path: path.clone(),
                error: e.to_string(),
            },
            _ => CatalogError::Io {
                path: path.clone(),
                error: e.to_string(),
            },
        })?;

        let catalog = Self::parse(&content, &path)?;
        tracing::debug!(
            path = %path.display(),
            datasets = catalog.len(),
            "Schema loaded successfully"
        );
        Ok(catalog)
    }

    /// Parse catalog content; `path` is only used for error context
    pub fn parse(content: &str, path: &Path) -> Result<Self, CatalogError> {
        let parse_error = |error: String| CatalogError::ConfigParseError {
            path: path.to_path_buf(),
            error,
        };

        let document: Map<String, Value> =
            serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;

        let mut datasets = Vec::with_capacity(document.len());
        for (name, entry) in document {
            let descriptors: Vec<RawDescriptor> = serde_json::from_value(entry).map_err(|e| {
                parse_error(format!(
                    "dataset '{}' must be a list of column objects: {}",
                    name, e
                ))
            })?;
            datasets.push(DatasetSchema { name, descriptors });
        }

        Ok(Self { datasets })
    }

    /// Look up a dataset by name
    pub fn get(&self, dataset: &str) -> Option<&DatasetSchema> {
        self.datasets.iter().find(|d| d.name == dataset)
    }

    /// Check whether the catalog defines a dataset
    pub fn contains(&self, dataset: &str) -> bool {
        self.get(dataset).is_some()
    }

    /// Dataset names in catalog order
    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets.iter().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_preserves_dataset_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CATALOG_FILENAME),
            r#"{
                "orders": [{"column_name": "id", "column_position": 1}],
                "customers": [{"column_name": "id", "column_position": 1}],
                "addresses": [{"column_name": "id", "column_position": 1}]
            }"#,
        )
        .unwrap();

        let catalog = SchemaCatalog::load(dir.path()).unwrap();
        assert_eq!(
            catalog.dataset_names(),
            vec!["orders", "customers", "addresses"]
        );
        assert!(catalog.contains("customers"));
        assert!(!catalog.contains("payments"));
    }

    #[test]
    fn test_load_missing_catalog() {
        let dir = TempDir::new().unwrap();
        let err = SchemaCatalog::load(dir.path()).unwrap_err();
        match err {
            CatalogError::ConfigNotFound(path) => {
                assert_eq!(path, dir.path().join(CATALOG_FILENAME));
            }
            other => panic!("expected ConfigNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CATALOG_FILENAME), "{ not json").unwrap();

        let err = SchemaCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, CatalogError::ConfigParseError { .. }));
    }

    #[test]
    fn test_parse_rejects_non_object_document() {
        let err = SchemaCatalog::parse("[1, 2, 3]", Path::new("schemas.json")).unwrap_err();
        assert!(matches!(err, CatalogError::ConfigParseError { .. }));
    }

    #[test]
    fn test_parse_rejects_non_list_dataset() {
        let err = SchemaCatalog::parse(r#"{"orders": "id,name"}"#, Path::new("schemas.json"))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("orders"), "unexpected message: {}", message);
    }

    #[test]
    fn test_parse_keeps_unvalidated_descriptors() {
        // Missing fields are only reported when the dataset is resolved
        let catalog =
            SchemaCatalog::parse(r#"{"orders": [{"name": "id"}]}"#, Path::new("schemas.json"))
                .unwrap();
        let orders = catalog.get("orders").unwrap();
        assert_eq!(orders.descriptors.len(), 1);
        assert!(orders.descriptors[0].contains_key("name"));
    }
}
