use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;

use crate::error::SyncError;
use crate::fs_util::{absolute, write_file_atomic};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// A blob backend. `get_blob` must report a missing blob (or a missing
/// container) as [`SyncError::BlobNotFound`] so callers can tell "nothing there
/// yet" apart from a failing backend.
pub trait BlobStore: Send + Sync {
    fn ensure_container(&self, container: &str) -> Result<(), SyncError>;
    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>, SyncError>;
    fn put_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), SyncError>;
    fn blob_url(&self, container: &str, name: &str) -> String;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn ensure_container(&self, container: &str) -> Result<(), SyncError> {
        (**self).ensure_container(container)
    }

    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>, SyncError> {
        (**self).get_blob(container, name)
    }

    fn put_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), SyncError> {
        (**self).put_blob(container, name, content, content_type)
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        (**self).blob_url(container, name)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn ensure_container(&self, container: &str) -> Result<(), SyncError> {
        (**self).ensure_container(container)
    }

    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>, SyncError> {
        (**self).get_blob(container, name)
    }

    fn put_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), SyncError> {
        (**self).put_blob(container, name, content, content_type)
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        (**self).blob_url(container, name)
    }
}

/// Moves whole dataset files between the local work directory and a blob store.
#[derive(Clone)]
pub struct StorageGateway<B: BlobStore> {
    store: B,
}

impl<B: BlobStore> StorageGateway<B> {
    pub fn new(store: B) -> Self {
        Self { store }
    }

    /// Copies the blob to `destination`. `Ok(None)` means there is no such blob.
    pub fn download(
        &self,
        container: &str,
        blob_name: &str,
        destination: &Path,
    ) -> Result<Option<PathBuf>, SyncError> {
        let content = match self.store.get_blob(container, blob_name) {
            Ok(content) => content,
            Err(SyncError::BlobNotFound { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        write_file_atomic(destination, &content)?;
        absolute(destination).map(Some)
    }

    /// Replaces the blob with the bytes of `local_path` and returns its URL.
    pub fn upload(
        &self,
        local_path: &Path,
        container: &str,
        blob_name: &str,
    ) -> Result<String, SyncError> {
        self.store.ensure_container(container)?;
        let content = fs::read(local_path).map_err(|err| {
            SyncError::Filesystem(format!("read {}: {err}", local_path.display()))
        })?;
        self.store
            .put_blob(container, blob_name, &content, CSV_CONTENT_TYPE)?;
        Ok(self.store.blob_url(container, blob_name))
    }
}

/// Containers are directories under `root`, blobs are files inside them.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: Utf8PathBuf,
}

impl FsBlobStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn container_dir(&self, container: &str) -> Utf8PathBuf {
        self.root.join(container)
    }

    pub fn blob_path(&self, container: &str, name: &str) -> Utf8PathBuf {
        self.container_dir(container).join(name)
    }
}

impl BlobStore for FsBlobStore {
    fn ensure_container(&self, container: &str) -> Result<(), SyncError> {
        fs::create_dir_all(self.container_dir(container).as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))
    }

    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>, SyncError> {
        let path = self.blob_path(container, name);
        match fs::read(path.as_std_path()) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(SyncError::BlobNotFound {
                container: container.to_string(),
                blob: name.to_string(),
            }),
            Err(err) => Err(SyncError::Filesystem(format!("read {path}: {err}"))),
        }
    }

    fn put_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        _content_type: &str,
    ) -> Result<(), SyncError> {
        if !self.container_dir(container).as_std_path().is_dir() {
            return Err(SyncError::ContainerNotFound(container.to_string()));
        }
        write_file_atomic(self.blob_path(container, name).as_std_path(), content)
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        let path = self.blob_path(container, name);
        let absolute = std::path::absolute(path.as_std_path())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.to_string());
        format!("file://{absolute}")
    }
}
