use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Column order of every dataset file.
pub const HEADER: [&str; 6] = ["id", "title", "authors", "year", "venue", "abstract"];

/// Fallback for `year` when the source carries neither a year nor a free-text date.
pub const UNKNOWN_YEAR: &str = "N/A";

/// One normalized literature entry. All fields are plain strings; a missing
/// value is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub year: String,
    pub venue: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl Record {
    pub fn fields(&self) -> [&str; 6] {
        [
            &self.id,
            &self.title,
            &self.authors,
            &self.year,
            &self.venue,
            &self.abstract_text,
        ]
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Keeps the positionally last row for every key. Survivors stay in the order
/// of their surviving occurrence.
pub fn keep_last_by<K, F>(rows: Vec<Record>, key: F) -> Vec<Record>
where
    K: Eq + Hash,
    F: Fn(&Record) -> K,
{
    let mut seen = HashSet::new();
    let mut kept = rows
        .into_iter()
        .rev()
        .filter(|row| seen.insert(key(row)))
        .collect::<Vec<_>>();
    kept.reverse();
    kept
}

/// Last-write-wins on non-empty ids; rows without an id are never collapsed.
pub fn dedup_by_id(rows: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut kept = rows
        .into_iter()
        .rev()
        .filter(|row| !row.has_id() || seen.insert(row.id.clone()))
        .collect::<Vec<_>>();
    kept.reverse();
    kept
}
