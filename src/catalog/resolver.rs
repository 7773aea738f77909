//! Column order resolution
//!
//! Source files carry no header row, so the position of every value is
//! defined by the catalog. Descriptors are validated in one pass, then sorted
//! by the sort key (stable, so equal positions keep their catalog order).

use super::{COLUMN_NAME_FIELD, CatalogError, RawDescriptor, SchemaCatalog};

/// A validated column descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name used as the destination column
    pub column_name: String,
    /// Value of the sort key
    pub position: i64,
}

/// Validate the descriptors of one dataset against the required fields
///
/// Required fields are `column_name` (string) and `sort_key` (integer).
pub fn validate_descriptors(
    dataset: &str,
    descriptors: &[RawDescriptor],
    sort_key: &str,
) -> Result<Vec<ColumnDescriptor>, CatalogError> {
    if descriptors.is_empty() {
        return Err(CatalogError::EmptySchema(dataset.to_string()));
    }

    descriptors
        .iter()
        .map(|descriptor| {
            let position = descriptor
                .get(sort_key)
                .ok_or_else(|| missing(dataset, sort_key))?;
            let position = position.as_i64().ok_or_else(|| CatalogError::InvalidField {
                dataset: dataset.to_string(),
                field: sort_key.to_string(),
                reason: format!("must be an integer, found {}", position),
            })?;

            let name = descriptor
                .get(COLUMN_NAME_FIELD)
                .ok_or_else(|| missing(dataset, COLUMN_NAME_FIELD))?;
            let column_name = name
                .as_str()
                .ok_or_else(|| CatalogError::InvalidField {
                    dataset: dataset.to_string(),
                    field: COLUMN_NAME_FIELD.to_string(),
                    reason: format!("must be a string, found {}", name),
                })?
                .to_string();

            Ok(ColumnDescriptor {
                column_name,
                position,
            })
        })
        .collect()
}

/// Resolve the ordered column names of a dataset
///
/// # Arguments
/// * `catalog` - Loaded schema catalog
/// * `dataset` - Dataset name to resolve
/// * `sort_key` - Descriptor field to sort by, usually [`super::DEFAULT_SORT_KEY`]
///
/// # Returns
/// Column names sorted ascending by the sort key
pub fn resolve_columns(
    catalog: &SchemaCatalog,
    dataset: &str,
    sort_key: &str,
) -> Result<Vec<String>, CatalogError> {
    let schema = catalog
        .get(dataset)
        .ok_or_else(|| missing(dataset, dataset))?;

    let mut columns = validate_descriptors(dataset, &schema.descriptors, sort_key)?;

    columns.sort_by_key(|c| c.position);

    Ok(columns.into_iter().map(|c| c.column_name).collect())
}

fn missing(dataset: &str, field: &str) -> CatalogError {
    CatalogError::SchemaFieldMissing {
        dataset: dataset.to_string(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DEFAULT_SORT_KEY;
    use std::path::Path;

    fn catalog(json: &str) -> SchemaCatalog {
        SchemaCatalog::parse(json, Path::new("schemas.json")).unwrap()
    }

    #[test]
    fn test_resolve_sorts_by_position() {
        let catalog = catalog(
            r#"{"sales": [
                {"column_name": "id", "column_position": 2},
                {"column_name": "name", "column_position": 0},
                {"column_name": "amount", "column_position": 1}
            ]}"#,
        );

        let columns = resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).unwrap();
        assert_eq!(columns, vec!["name", "amount", "id"]);
    }

    #[test]
    fn test_resolve_non_contiguous_positions() {
        let catalog = catalog(
            r#"{"sales": [
                {"column_name": "c", "column_position": 30},
                {"column_name": "a", "column_position": -5},
                {"column_name": "b", "column_position": 7}
            ]}"#,
        );

        let columns = resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).unwrap();
        assert_eq!(columns, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_resolve_ties_keep_catalog_order() {
        let catalog = catalog(
            r#"{"sales": [
                {"column_name": "second", "column_position": 1},
                {"column_name": "first", "column_position": 0},
                {"column_name": "third", "column_position": 1}
            ]}"#,
        );

        let columns = resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).unwrap();
        assert_eq!(columns, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_resolve_custom_sort_key() {
        let catalog = catalog(
            r#"{"sales": [
                {"column_name": "x", "column_position": 0, "ordinal": 9},
                {"column_name": "y", "column_position": 1, "ordinal": 3}
            ]}"#,
        );

        let columns = resolve_columns(&catalog, "sales", "ordinal").unwrap();
        assert_eq!(columns, vec!["y", "x"]);
    }

    #[test]
    fn test_resolve_missing_dataset() {
        let catalog = catalog(r#"{"sales": [{"column_name": "id", "column_position": 0}]}"#);

        let err = resolve_columns(&catalog, "refunds", DEFAULT_SORT_KEY).unwrap_err();
        match err {
            CatalogError::SchemaFieldMissing { dataset, field } => {
                assert_eq!(dataset, "refunds");
                assert_eq!(field, "refunds");
            }
            other => panic!("expected SchemaFieldMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_errors_are_returned_not_logged() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let log = Captured::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        let catalog = catalog(r#"{"sales": [{"column_name": "id"}]}"#);

        tracing::subscriber::with_default(subscriber, || {
            assert!(resolve_columns(&catalog, "refunds", DEFAULT_SORT_KEY).is_err());
            assert!(resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).is_err());
        });

        assert!(log.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_missing_sort_key() {
        let catalog = catalog(
            r#"{"sales": [
                {"column_name": "id", "column_position": 0},
                {"column_name": "name"}
            ]}"#,
        );

        let err = resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).unwrap_err();
        match err {
            CatalogError::SchemaFieldMissing { dataset, field } => {
                assert_eq!(dataset, "sales");
                assert_eq!(field, DEFAULT_SORT_KEY);
            }
            other => panic!("expected SchemaFieldMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_column_name() {
        let catalog = catalog(r#"{"sales": [{"column_position": 0}]}"#);

        let err = resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::SchemaFieldMissing { ref field, .. } if field == COLUMN_NAME_FIELD
        ));
    }

    #[test]
    fn test_resolve_rejects_non_integer_position() {
        let catalog = catalog(r#"{"sales": [{"column_name": "id", "column_position": "1"}]}"#);

        let err = resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidField { .. }));
    }

    #[test]
    fn test_resolve_empty_schema() {
        let catalog = catalog(r#"{"sales": []}"#);

        let err = resolve_columns(&catalog, "sales", DEFAULT_SORT_KEY).unwrap_err();
        assert!(matches!(err, CatalogError::EmptySchema(ref d) if d == "sales"));
    }
}
