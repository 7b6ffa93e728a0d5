use std::path::PathBuf;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::error::SyncError;
use crate::fetcher::{Fetcher, Pacer};
use crate::fs_util::remove_file_if_exists;
use crate::merge::merge_with_summary;
use crate::ncbi::PubmedClient;
use crate::storage::{BlobStore, StorageGateway};

pub const FRESH_FILE: &str = "pubmed_new.csv";
pub const EXISTING_FILE: &str = "pubmed_existing.csv";
pub const MERGED_FILE: &str = "pubmed_combined.csv";

/// Everything one run needs to know; fixed by configuration, not per call.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub query: String,
    pub max_results: usize,
    pub container: String,
    pub blob_name: String,
    pub work_dir: Utf8PathBuf,
}

impl RunPlan {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            query: config.query.clone(),
            max_results: config.max_results,
            container: config.container.clone(),
            blob_name: config.blob_name.clone(),
            work_dir: config.work_dir.clone(),
        }
    }

    pub fn fresh_path(&self) -> Utf8PathBuf {
        self.work_dir.join(FRESH_FILE)
    }

    pub fn existing_path(&self) -> Utf8PathBuf {
        self.work_dir.join(EXISTING_FILE)
    }

    pub fn merged_path(&self) -> Utf8PathBuf {
        self.work_dir.join(MERGED_FILE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub query: String,
    pub identifiers: usize,
    pub fetched_rows: usize,
    pub previous_found: bool,
    pub previous_rows: usize,
    pub merged_rows: usize,
    pub fresh_path: PathBuf,
    pub merged_path: PathBuf,
    pub blob_url: String,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<C: PubmedClient, B: BlobStore, P: Pacer> {
    fetcher: Fetcher<C, P>,
    gateway: StorageGateway<B>,
}

impl<C: PubmedClient, B: BlobStore, P: Pacer> App<C, B, P> {
    pub fn new(client: C, store: B, pacer: P) -> Self {
        Self {
            fetcher: Fetcher::new(client, pacer),
            gateway: StorageGateway::new(store),
        }
    }

    /// Fetch, download, merge, upload. The remote blob is only touched by the
    /// final upload, so any earlier failure leaves it as it was.
    pub fn run(&self, plan: &RunPlan, sink: &dyn ProgressSink) -> Result<RunResult, SyncError> {
        let started_at = Utc::now();

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; query max_results={}", plan.max_results),
            elapsed: None,
        });
        let start = Instant::now();
        let fetched = self.fetcher.fetch_with_summary(
            &plan.query,
            plan.max_results,
            plan.fresh_path().as_std_path(),
        )?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Fetch; identifiers={} batches={} rows={}",
                fetched.identifiers, fetched.batches, fetched.rows
            ),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: format!(
                "phase=Download; blob {}/{}",
                plan.container, plan.blob_name
            ),
            elapsed: None,
        });
        let existing_path = plan.existing_path();
        remove_file_if_exists(existing_path.as_std_path())?;
        let start = Instant::now();
        let previous =
            self.gateway
                .download(&plan.container, &plan.blob_name, existing_path.as_std_path())?;
        sink.event(ProgressEvent {
            message: match &previous {
                Some(_) => "phase=Download; cumulative dataset found".to_string(),
                None => "phase=Download; no cumulative dataset yet".to_string(),
            },
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: "phase=Merge; combining datasets".to_string(),
            elapsed: None,
        });
        let merged = merge_with_summary(
            previous.as_deref(),
            &fetched.path,
            plan.merged_path().as_std_path(),
        )?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Merge; previous={} fresh={} merged={}",
                merged.previous_rows, merged.fresh_rows, merged.merged_rows
            ),
            elapsed: None,
        });

        sink.event(ProgressEvent {
            message: "phase=Upload; replacing cumulative dataset".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let blob_url = self
            .gateway
            .upload(&merged.path, &plan.container, &plan.blob_name)?;
        sink.event(ProgressEvent {
            message: format!("phase=Upload; {blob_url}"),
            elapsed: Some(start.elapsed()),
        });

        Ok(RunResult {
            started_at,
            finished_at: Utc::now(),
            query: plan.query.clone(),
            identifiers: fetched.identifiers,
            fetched_rows: fetched.rows,
            previous_found: previous.is_some(),
            previous_rows: merged.previous_rows,
            merged_rows: merged.merged_rows,
            fresh_path: fetched.path,
            merged_path: merged.path,
            blob_url,
            attempts: 1,
        })
    }
}
