use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Writes through a temp file in the destination directory and renames it over
/// `path`, so readers see either the old or the new content. Missing parent
/// directories are created.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|err| SyncError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".pubmed-sync")
        .tempfile_in(&parent)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.flush()
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn remove_file_if_exists(path: &Path) -> Result<(), SyncError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SyncError::Filesystem(format!(
            "remove {}: {err}",
            path.display()
        ))),
    }
}

pub fn absolute(path: &Path) -> Result<PathBuf, SyncError> {
    std::path::absolute(path).map_err(|err| SyncError::Filesystem(err.to_string()))
}
