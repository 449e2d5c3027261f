//! One interaction cycle: uploaded files and filter selections in, canonical
//! dataset, current view and report out.
//!
//! Nothing here keeps state between calls; the caller holds on to the
//! returned dataset for as long as the session lasts.
use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::filter::{filter, FilterPredicates};
use crate::loader::{ingest, LoadReport};
use crate::merge::{merge, MergeReport};
use crate::normalize::normalize;
use crate::reports::{compose, ReportSections};
use crate::types::{Outcome, Table};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self::new(path.display().to_string(), bytes))
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub name: String,
    pub error: IngestError,
}

/// The merged, deduplicated, normalized table for the current uploads.
#[derive(Debug)]
pub struct CanonicalDataset {
    pub table: Table,
    pub merge: MergeReport,
    pub loads: Vec<(String, LoadReport)>,
    pub failures: Vec<FileFailure>,
}

/// Ingest and normalize every upload, then merge what succeeded.
///
/// A file that cannot be read is recorded in `failures` and the rest are
/// still processed.
pub fn build_dataset(uploads: &[Upload], config: &PipelineConfig) -> Outcome<CanonicalDataset> {
    let mut out = Outcome::new(());
    let mut tables = Vec::with_capacity(uploads.len());
    let mut loads = Vec::new();
    let mut failures = Vec::new();
    for upload in uploads {
        match ingest(&upload.bytes) {
            Ok(ingested) => {
                let (table, report) = out.absorb(ingested);
                loads.push((upload.name.clone(), report));
                tables.push(out.absorb(normalize(table, config)));
            }
            Err(error) => {
                warn!("failed to ingest {}: {}", upload.name, error);
                failures.push(FileFailure {
                    name: upload.name.clone(),
                    error,
                });
            }
        }
    }
    let (table, merge_report) = merge(tables);
    info!(
        "dataset ready: {} row(s) from {} file(s), {} duplicate(s) removed, {} failure(s)",
        table.len(),
        loads.len(),
        merge_report.duplicates_removed,
        failures.len()
    );
    out.map(|_| CanonicalDataset {
        table,
        merge: merge_report,
        loads,
        failures,
    })
}

/// The canonical dataset narrowed by the current selections.
pub fn current_view(dataset: &CanonicalDataset, predicates: &FilterPredicates) -> Outcome<Table> {
    filter(&dataset.table, predicates)
}

#[derive(Debug)]
pub struct CycleOutput {
    pub dataset: CanonicalDataset,
    pub view: Table,
    pub report: ReportSections,
}

/// Full recomputation: build the dataset, filter it, compose the report.
pub fn run_cycle(
    uploads: &[Upload],
    predicates: &FilterPredicates,
    config: &PipelineConfig,
) -> Outcome<CycleOutput> {
    let mut out = Outcome::new(());
    let dataset = out.absorb(build_dataset(uploads, config));
    let view = out.absorb(current_view(&dataset, predicates));
    let report = out.absorb(compose(&view, config));
    out.map(|_| CycleOutput {
        dataset,
        view,
        report,
    })
}
