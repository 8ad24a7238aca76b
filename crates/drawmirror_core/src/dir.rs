//! Data directory management.
//!
//! This module handles the file system layout of one instance:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK              # Advisory lock for single-owner access
//! ├─ dataset.archive   # Current dataset snapshot
//! └─ nodes.json        # Node registry
//! ```
//!
//! Snapshot files are replaced by write-temp, fsync, rename, so a sibling
//! `*.tmp` file may briefly exist while a write is in flight.

use crate::error::{CoreError, CoreResult};
use drawmirror_storage::FileBackend;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File names within the data directory.
const LOCK_FILE: &str = "LOCK";
/// Dataset snapshot file name.
pub const DATASET_FILE: &str = "dataset.archive";
/// Registry file name.
pub const REGISTRY_FILE: &str = "nodes.json";

/// Owns an instance's data directory.
///
/// # Thread Safety
///
/// The `DataDir` holds an exclusive advisory lock on `LOCK` for as long as
/// it lives. A second `open` on the same directory, from this or another
/// process, fails with `Locked`.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    _lock_file: File,
}

impl DataDir {
    /// Opens or creates a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path exists but is not a directory
    /// - Another owner holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_input(format!(
                    "data directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_input(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::Locked);
        }

        tracing::debug!(path = %path.display(), "data directory locked");
        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the dataset snapshot.
    #[must_use]
    pub fn dataset_path(&self) -> PathBuf {
        self.path.join(DATASET_FILE)
    }

    /// Returns the path of the registry file.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.path.join(REGISTRY_FILE)
    }

    /// Opens the backend holding the dataset snapshot.
    ///
    /// # Errors
    ///
    /// I/O errors while clearing an interrupted write.
    pub fn dataset_backend(&self) -> CoreResult<FileBackend> {
        Ok(FileBackend::open(&self.path, DATASET_FILE)?)
    }

    /// Opens the backend holding the registry.
    ///
    /// # Errors
    ///
    /// I/O errors while clearing an interrupted write.
    pub fn registry_backend(&self) -> CoreResult<FileBackend> {
        Ok(FileBackend::open(&self.path, REGISTRY_FILE)?)
    }
}
