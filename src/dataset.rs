//! CSV codec for dataset files.
//!
//! Every file starts with the fixed header `id,title,authors,year,venue,abstract`.
//! Reading is forgiving about columns: they are matched by name, missing ones
//! read as empty strings and unknown ones are ignored. Header names from the
//! earlier PubMed export (`PMID`, `Journal`, ...) are accepted as aliases.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::SyncError;
use crate::fs_util::{absolute, write_file_atomic};
use crate::record::{HEADER, Record};

pub fn write_dataset(path: &Path, rows: &[Record]) -> Result<PathBuf, SyncError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer
        .write_record(HEADER)
        .map_err(|err| SyncError::Dataset(err.to_string()))?;
    for row in rows {
        writer
            .write_record(row.fields())
            .map_err(|err| SyncError::Dataset(err.to_string()))?;
    }
    let content = writer
        .into_inner()
        .map_err(|err| SyncError::Dataset(err.to_string()))?;
    write_file_atomic(path, &content)?;
    absolute(path)
}

pub fn read_dataset(path: &Path) -> Result<Vec<Record>, SyncError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| SyncError::Dataset(format!("{}: {err}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|err| SyncError::Dataset(format!("{}: {err}", path.display())))?
        .clone();
    let columns = ColumnMap::from_headers(&headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| SyncError::Dataset(format!("{}: {err}", path.display())))?;
        rows.push(columns.to_row(&record));
    }
    Ok(rows)
}

/// Reads `path` when it names an existing file; anything else is an empty dataset.
pub fn read_dataset_or_empty(path: Option<&Path>) -> Result<Vec<Record>, SyncError> {
    match path {
        Some(path) if path.is_file() => read_dataset(path),
        _ => Ok(Vec::new()),
    }
}

/// Position of each known field in the file being read.
#[derive(Debug, Default)]
struct ColumnMap {
    positions: [Option<usize>; 6],
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut map = Self::default();
        for (index, name) in headers.iter().enumerate() {
            if let Some(slot) = field_index(name) {
                map.positions[slot].get_or_insert(index);
            }
        }
        map
    }

    fn to_row(&self, record: &StringRecord) -> Record {
        let value = |slot: usize| {
            self.positions[slot]
                .and_then(|index| record.get(index))
                .unwrap_or("")
                .to_string()
        };
        Record {
            id: value(0),
            title: value(1),
            authors: value(2),
            year: value(3),
            venue: value(4),
            abstract_text: value(5),
        }
    }
}

fn field_index(name: &str) -> Option<usize> {
    let name = name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
    let canonical = match name.as_str() {
        "pmid" => "id",
        "journal" => "venue",
        other => other,
    };
    HEADER.iter().position(|field| *field == canonical)
}
