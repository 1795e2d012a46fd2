//! Where encoded documents go and come from.
//!
//! The library never touches the file system or a browser by itself: the
//! caller hands a [`Storage`] to [`Document::save`](crate::Document::save)
//! and friends.  [`FsStorage`] covers the local file system; hosts with an
//! interactive download facility implement [`Storage::offer_download`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {locator}")]
    NotFound { locator: String },
    #[error("Permission denied: {locator}")]
    PermissionDenied { locator: String },
    #[error("I/O error on {locator}: {source}")]
    Io {
        locator: String,
        #[source]
        source: io::Error,
    },
    #[error("{operation} is not available in this environment")]
    Unavailable { operation: &'static str },
}

impl StorageError {
    fn from_io(locator: &str, err: io::Error) -> Self {
        let locator = locator.to_owned();
        match err.kind() {
            io::ErrorKind::NotFound         => StorageError::NotFound { locator },
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied { locator },
            _ => StorageError::Io { locator, source: err },
        }
    }
}

pub trait Storage {
    fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError>;

    fn write(&self, locator: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Present `bytes` to the user as a download named `filename`.
    fn offer_download(&self, filename: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let _ = (filename, bytes);
        Err(StorageError::Unavailable { operation: "download" })
    }
}

// ── File system ──────────────────────────────────────────────────────────────

/// Local file system.  Locators are paths, resolved against `root` when one
/// is set.
#[derive(Debug, Clone, Default)]
pub struct FsStorage {
    root: Option<PathBuf>,
}

impl FsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    pub fn resolve(&self, locator: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(locator),
            None => Path::new(locator).to_path_buf(),
        }
    }
}

impl Storage for FsStorage {
    fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(locator);
        let bytes = fs::read(&path).map_err(|e| StorageError::from_io(locator, e))?;
        debug!(path = %path.display(), len = bytes.len(), "read file");
        Ok(bytes)
    }

    fn write(&self, locator: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(locator);
        fs::write(&path, bytes).map_err(|e| StorageError::from_io(locator, e))?;
        debug!(path = %path.display(), len = bytes.len(), "wrote file");
        Ok(())
    }
}

// ── In memory ────────────────────────────────────────────────────────────────

/// Keeps everything in a map.  Downloads are recorded under their filename.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files:     Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filenames offered for download so far, oldest first.
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn files(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map is still a valid map.
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        self.files()
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { locator: locator.to_owned() })
    }

    fn write(&self, locator: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.files().insert(locator.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn offer_download(&self, filename: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write(filename, bytes)?;
        self.downloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(filename.to_owned());
        Ok(())
    }
}
