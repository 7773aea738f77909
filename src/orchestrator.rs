//! Run orchestration
//!
//! A run loads the schema catalog, selects datasets and loads them one after
//! another through the same writer. A dataset that cannot be loaded at all is
//! recorded and skipped unless [`DatasetErrorPolicy::Abort`] is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::catalog::{CATALOG_FILENAME, CatalogError, SchemaCatalog};
use crate::database::TableWriter;
use crate::events::{EventSink, LoadEvent};
use crate::ingest::{DatasetReport, LoadError, LoadOptions, load_dataset, serialize_secs};

/// Which datasets a run loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSelector {
    /// Every dataset in catalog order
    All,
    /// Exactly these datasets, in this order
    Named(Vec<String>),
}

impl DatasetSelector {
    /// `All` when no names are given, `Named` otherwise
    pub fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() {
            DatasetSelector::All
        } else {
            DatasetSelector::Named(names)
        }
    }

    /// Dataset names to load, in load order
    pub fn resolve(&self, catalog: &SchemaCatalog) -> Vec<String> {
        match self {
            DatasetSelector::All => catalog.dataset_names(),
            DatasetSelector::Named(names) => names.clone(),
        }
    }
}

/// What to do when a dataset cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetErrorPolicy {
    /// Record the failure and continue with the next dataset (default)
    #[default]
    Continue,
    /// Stop the run
    Abort,
}

/// Options for a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Options applied to every dataset
    pub load: LoadOptions,
    /// Policy for dataset-level failures
    pub on_dataset_error: DatasetErrorPolicy,
}

/// A dataset that could not be loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetFailure {
    pub dataset: String,
    pub error: String,
}

/// Outcome of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,
    /// Reports of the datasets that were loaded, in load order
    pub datasets: Vec<DatasetReport>,
    /// Datasets that could not be loaded
    pub failed: Vec<DatasetFailure>,
    /// Duration of the run
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl RunReport {
    pub fn rows_written(&self) -> u64 {
        self.datasets.iter().map(|d| d.rows_written).sum()
    }

    pub fn chunks_written(&self) -> usize {
        self.datasets.iter().map(|d| d.chunks_written).sum()
    }

    pub fn chunks_failed(&self) -> usize {
        self.datasets.iter().map(|d| d.chunks_failed).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.datasets.iter().map(|d| d.files_failed).sum()
    }

    /// Whether every selected dataset was loaded without a single failure
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.datasets.iter().all(DatasetReport::is_complete)
    }
}

/// Errors that end a run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The schema catalog could not be loaded
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A dataset failed while the abort policy was active
    #[error("Dataset {dataset} failed: {source}")]
    Dataset {
        dataset: String,
        #[source]
        source: LoadError,
    },
}

/// Load the selected datasets using an already loaded catalog
///
/// # Arguments
/// * `base_dir` - Directory holding one subdirectory per dataset
/// * `catalog` - Schema catalog
/// * `writer` - Destination database, shared by every dataset
/// * `selector` - Datasets to load
/// * `options` - Load options and dataset failure policy
/// * `sink` - Receives progress and failure events
pub async fn run(
    base_dir: &Path,
    catalog: &SchemaCatalog,
    writer: &dyn TableWriter,
    selector: &DatasetSelector,
    options: &RunOptions,
    sink: &dyn EventSink,
) -> Result<RunReport, RunError> {
    let start = Instant::now();
    let mut report = RunReport {
        started_at: Some(Utc::now()),
        ..Default::default()
    };

    for dataset in selector.resolve(catalog) {
        match load_dataset(base_dir, catalog, writer, &dataset, &options.load, sink).await {
            Ok(dataset_report) => report.datasets.push(dataset_report),
            Err(e) => {
                sink.record(&LoadEvent::DatasetFailed {
                    dataset: dataset.clone(),
                    error: e.to_string(),
                });

                match options.on_dataset_error {
                    DatasetErrorPolicy::Continue => report.failed.push(DatasetFailure {
                        dataset,
                        error: e.to_string(),
                    }),
                    DatasetErrorPolicy::Abort => {
                        return Err(RunError::Dataset { dataset, source: e });
                    }
                }
            }
        }
    }

    report.duration = start.elapsed();
    Ok(report)
}

/// Load `schemas.json` from `base_dir` and record the outcome
///
/// A missing or malformed catalog is reported as a single fatal event.
pub fn load_catalog(base_dir: &Path, sink: &dyn EventSink) -> Result<SchemaCatalog, RunError> {
    let catalog = match SchemaCatalog::load(base_dir) {
        Ok(catalog) => catalog,
        Err(e) => {
            sink.record(&LoadEvent::Fatal {
                error: e.to_string(),
            });
            return Err(e.into());
        }
    };

    sink.record(&LoadEvent::CatalogLoaded {
        path: base_dir.join(CATALOG_FILENAME),
        datasets: catalog.len(),
    });

    Ok(catalog)
}

/// [`load_catalog`], then [`run`]
///
/// Nothing is written when the catalog cannot be loaded.
pub async fn run_from_dir(
    base_dir: &Path,
    writer: &dyn TableWriter,
    selector: &DatasetSelector,
    options: &RunOptions,
    sink: &dyn EventSink,
) -> Result<RunReport, RunError> {
    let catalog = load_catalog(base_dir, sink)?;
    run(base_dir, &catalog, writer, selector, options, sink).await
}
