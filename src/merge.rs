//! Folding a fresh fetch into the cumulative dataset.
//!
//! Rows are concatenated previous-then-fresh and deduplicated with
//! last-write-wins, so a fresh row always replaces an older row with the same
//! key. Rows carrying an id are keyed by id; rows without one are keyed by
//! `(title, year)`. Id-keyed rows come first in the output.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::dataset::{read_dataset, read_dataset_or_empty, write_dataset};
use crate::error::SyncError;
use crate::record::{Record, keep_last_by};

#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub path: PathBuf,
    pub previous_rows: usize,
    pub fresh_rows: usize,
    pub merged_rows: usize,
}

pub fn merge_records(previous: Vec<Record>, fresh: Vec<Record>) -> Vec<Record> {
    let (with_id, without_id): (Vec<_>, Vec<_>) = previous
        .into_iter()
        .chain(fresh)
        .partition(Record::has_id);

    let mut merged = keep_last_by(with_id, |row| row.id.clone());
    merged.extend(keep_last_by(without_id, |row| {
        (row.title.clone(), row.year.clone())
    }));
    merged
}

/// Merges the dataset files and writes the result to `destination`.
/// A `previous` that is `None` or does not exist counts as empty.
pub fn merge(
    previous: Option<&Path>,
    fresh: &Path,
    destination: &Path,
) -> Result<PathBuf, SyncError> {
    merge_with_summary(previous, fresh, destination).map(|summary| summary.path)
}

pub fn merge_with_summary(
    previous: Option<&Path>,
    fresh: &Path,
    destination: &Path,
) -> Result<MergeSummary, SyncError> {
    let previous = read_dataset_or_empty(previous)?;
    let fresh = read_dataset(fresh)?;
    let previous_rows = previous.len();
    let fresh_rows = fresh.len();

    let merged = merge_records(previous, fresh);
    let path = write_dataset(destination, &merged)?;
    Ok(MergeSummary {
        path,
        previous_rows,
        fresh_rows,
        merged_rows: merged.len(),
    })
}
