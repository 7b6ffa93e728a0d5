use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::dataset::write_dataset;
use crate::error::SyncError;
use crate::ncbi::PubmedClient;
use crate::normalize::normalize;
use crate::record::dedup_by_id;

/// Identifiers requested per efetch call.
pub const BATCH_SIZE: usize = 200;

/// Gap between consecutive efetch calls, keeping under three requests a second.
pub const BATCH_PAUSE: Duration = Duration::from_millis(340);

/// Waits between remote calls. Swapped out in tests so nothing actually sleeps.
pub trait Pacer: Send + Sync {
    fn pause(&self, duration: Duration);
}

impl<T: Pacer + ?Sized> Pacer for &T {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleepPacer;

impl Pacer for ThreadSleepPacer {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub path: PathBuf,
    pub identifiers: usize,
    pub batches: usize,
    pub rows: usize,
}

#[derive(Clone)]
pub struct Fetcher<C: PubmedClient, P: Pacer> {
    client: C,
    pacer: P,
}

impl<C: PubmedClient, P: Pacer> Fetcher<C, P> {
    pub fn new(client: C, pacer: P) -> Self {
        Self { client, pacer }
    }

    /// Searches, fetches and normalizes, then writes the fresh dataset to
    /// `destination`. Returns the absolute path written.
    pub fn fetch(
        &self,
        query: &str,
        max_results: usize,
        destination: &Path,
    ) -> Result<PathBuf, SyncError> {
        self.fetch_with_summary(query, max_results, destination)
            .map(|summary| summary.path)
    }

    pub fn fetch_with_summary(
        &self,
        query: &str,
        max_results: usize,
        destination: &Path,
    ) -> Result<FetchSummary, SyncError> {
        let ids = self.client.search(query, max_results)?;
        tracing::debug!(identifiers = ids.len(), "esearch complete");

        let mut rows = Vec::new();
        let mut batches = 0usize;
        for (index, chunk) in ids.chunks(BATCH_SIZE).enumerate() {
            if index > 0 {
                self.pacer.pause(BATCH_PAUSE);
            }
            let articles = self.client.fetch_full(chunk)?;
            tracing::debug!(batch = index, records = articles.len(), "efetch batch");
            rows.extend(articles.iter().map(normalize));
            batches += 1;
        }

        let rows = dedup_by_id(rows);
        let path = write_dataset(destination, &rows)?;
        Ok(FetchSummary {
            path,
            identifiers: ids.len(),
            batches,
            rows: rows.len(),
        })
    }
}
