//! Filesystem asset storage.
//!
//! Uploaded files live under one asset root: e-book PDFs at the top level,
//! audio under `audio/`, cover images under `covers/`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::filename::sanitize_filename;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("filename is empty or contains no storable characters")]
    InvalidFilename,
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("asset io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage area within the asset root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFolder {
    Ebooks,
    Audio,
    Covers,
}

impl AssetFolder {
    fn relative(&self) -> &'static str {
        match self {
            AssetFolder::Ebooks => "",
            AssetFolder::Audio => "audio",
            AssetFolder::Covers => "covers",
        }
    }
}

/// Blob storage seam for uploaded assets.
pub trait AssetStore: Send + Sync {
    /// Sanitize `filename` and persist `bytes` under `folder`. Returns the
    /// stored (sanitized) filename.
    fn save(&self, folder: AssetFolder, filename: &str, bytes: &[u8]) -> Result<String, AssetError>;

    fn read(&self, folder: AssetFolder, filename: &str) -> Result<Vec<u8>, AssetError>;

    /// Remove a stored asset. Removing a missing asset is not an error.
    fn remove(&self, folder: AssetFolder, filename: &str) -> Result<(), AssetError>;
}

/// Asset store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, folder: AssetFolder, filename: &str) -> Result<PathBuf, AssetError> {
        let safe = sanitize_filename(filename).ok_or(AssetError::InvalidFilename)?;
        Ok(self.root.join(folder.relative()).join(safe))
    }
}

impl AssetStore for FsAssetStore {
    fn save(&self, folder: AssetFolder, filename: &str, bytes: &[u8]) -> Result<String, AssetError> {
        let path = self.resolve(folder, filename)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&path)?;
        file.write_all(bytes)?;
        file.sync_all()?;

        // resolve() only succeeds with a sanitized final component.
        let stored = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(AssetError::InvalidFilename)?;
        Ok(stored.to_string())
    }

    fn read(&self, folder: AssetFolder, filename: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.resolve(folder, filename)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::NotFound(filename.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, folder: AssetFolder, filename: &str) -> Result<(), AssetError> {
        let path = self.resolve(folder, filename)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
