use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::ncbi::EntrezIdentity;
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "pubmed-sync.json";
pub const DEFAULT_QUERY: &str = r#"(("Cardiovascular Diseases"[MeSH] OR "Heart Diseases"[MeSH])) AND (2010:2025[dp])"#;
pub const DEFAULT_MAX_RESULTS: usize = 1000;
pub const DEFAULT_CONTAINER: &str = "pubmed-data";
pub const DEFAULT_BLOB_NAME: &str = "pubmed_combined.csv";
pub const DEFAULT_EMAIL: &str = "please-set-NCBI_EMAIL@example.com";

pub const ENV_NCBI_EMAIL: &str = "NCBI_EMAIL";
pub const ENV_NCBI_API_KEY: &str = "NCBI_API_KEY";
pub const ENV_STORAGE_CONNECTION: &str = "AZURE_STORAGE_CONNECTION_STRING";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub blob_name: Option<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub storage: Option<StorageEntry>,
    #[serde(default)]
    pub retry: Option<RetryEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageEntry {
    Azure,
    Filesystem { root: String },
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetryEntry {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub delay_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Azure,
    Filesystem(Utf8PathBuf),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub query: String,
    pub max_results: usize,
    pub container: String,
    pub blob_name: String,
    pub work_dir: Utf8PathBuf,
    pub storage: StorageBackend,
    pub retry: RetryPolicy,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `pubmed-sync.json` from the current directory. Only the
    /// default file may be missing; built-in defaults apply in that case.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SyncError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SyncError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SyncError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SyncError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let query = required(config.query, DEFAULT_QUERY, "query")?;
        let container = required(config.container, DEFAULT_CONTAINER, "container")?;
        let blob_name = required(config.blob_name, DEFAULT_BLOB_NAME, "blob_name")?;

        let max_results = config.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            return Err(SyncError::ConfigParse(
                "max_results must be at least 1".to_string(),
            ));
        }

        let work_dir = match config.work_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_work_dir()?,
        };

        let storage = match config.storage {
            None | Some(StorageEntry::Azure) => StorageBackend::Azure,
            Some(StorageEntry::Filesystem { root }) => {
                StorageBackend::Filesystem(Utf8PathBuf::from(root))
            }
        };

        let retry_entry = config.retry.unwrap_or_default();
        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: retry_entry.max_attempts.unwrap_or(defaults.max_attempts),
            delay: retry_entry
                .delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.delay),
        };
        if retry.max_attempts == 0 {
            return Err(SyncError::ConfigParse(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            query,
            max_results,
            container,
            blob_name,
            work_dir,
            storage,
            retry,
        })
    }
}

fn required(value: Option<String>, default: &str, field: &str) -> Result<String, SyncError> {
    let value = value.unwrap_or_else(|| default.to_string());
    if value.trim().is_empty() {
        return Err(SyncError::ConfigParse(format!("{field} must not be empty")));
    }
    Ok(value)
}

pub fn default_work_dir() -> Result<Utf8PathBuf, SyncError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.cache_dir().join("pubmed-sync").join("work")).ok()
        })
        .ok_or_else(|| SyncError::Filesystem("unable to resolve work directory".to_string()))
}

/// Secrets and identity. Read from the environment by the binary only; the
/// library receives them as values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ncbi_email: String,
    pub ncbi_api_key: Option<String>,
    pub storage_connection_string: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            ncbi_email: present(ENV_NCBI_EMAIL).unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
            ncbi_api_key: present(ENV_NCBI_API_KEY),
            storage_connection_string: present(ENV_STORAGE_CONNECTION),
        }
    }

    pub fn entrez_identity(&self) -> EntrezIdentity {
        EntrezIdentity {
            email: self.ncbi_email.clone(),
            api_key: self.ncbi_api_key.clone(),
        }
    }

    pub fn connection_string(&self) -> Result<&str, SyncError> {
        self.storage_connection_string
            .as_deref()
            .ok_or_else(|| SyncError::MissingCredential(ENV_STORAGE_CONNECTION.to_string()))
    }
}
