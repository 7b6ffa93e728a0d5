use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("E-utilities request failed: {0}")]
    EutilsHttp(String),

    #[error("E-utilities returned status {status}: {message}")]
    EutilsStatus { status: u16, message: String },

    #[error("failed to parse E-utilities response: {0}")]
    EutilsParse(String),

    #[error("storage request failed: {0}")]
    StorageHttp(String),

    #[error("storage returned status {status}: {message}")]
    StorageStatus { status: u16, message: String },

    #[error("blob not found: {container}/{blob}")]
    BlobNotFound { container: String, blob: String },

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid storage connection string: {0}")]
    #[diagnostic(help("provide SharedAccessSignature, or AccountName together with AccountKey"))]
    InvalidConnectionString(String),

    #[error("missing credential: {0}")]
    #[diagnostic(help("export the variable before running pubmed-sync"))]
    MissingCredential(String),
}

impl SyncError {
    /// Configuration problems fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::ConfigRead(_)
                | SyncError::ConfigParse(_)
                | SyncError::InvalidConnectionString(_)
                | SyncError::MissingCredential(_)
        )
    }
}
