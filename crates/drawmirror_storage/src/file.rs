//! File-based snapshot backend.
//!
//! The snapshot lives in a single file. Staging writes a sibling
//! `<name>.tmp` and syncs it; committing renames it over the target and
//! syncs the parent directory so the rename itself is durable.

use crate::backend::SnapshotBackend;
use crate::error::{StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// A snapshot backend over one file in a directory.
///
/// # Crash Safety
///
/// A crash while staging leaves only a `.tmp` file, which is removed the
/// next time the backend is opened. A crash after the rename leaves the new
/// snapshot in place. The target file is never partially written.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    staged_path: PathBuf,
    staged: bool,
}

impl FileBackend {
    /// Opens the snapshot file `file_name` inside `dir`.
    ///
    /// The directory is created if needed. A leftover staged file from an
    /// interrupted replace is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the leftover
    /// file cannot be removed.
    pub fn open(dir: impl AsRef<Path>, file_name: &str) -> StorageResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(file_name);
        let staged_path = dir.join(format!("{file_name}.tmp"));
        match fs::remove_file(&staged_path) {
            Ok(()) => {
                tracing::warn!(path = %staged_path.display(), "removed interrupted staged snapshot");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            staged_path,
            staged: false,
        })
    }

    /// Returns the path of the committed snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync_parent(&self) -> StorageResult<()> {
        #[cfg(unix)]
        {
            if let Some(parent) = self.path.parent() {
                File::open(parent)?.sync_all()?;
            }
        }
        Ok(())
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    fn stage(&mut self, data: &[u8]) -> StorageResult<()> {
        let result = (|| -> StorageResult<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.staged_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.staged = true;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&self.staged_path);
                self.staged = false;
                Err(e)
            }
        }
    }

    fn commit(&mut self) -> StorageResult<()> {
        if !self.staged {
            return Err(StorageError::NothingStaged);
        }
        fs::rename(&self.staged_path, &self.path)?;
        self.staged = false;
        self.sync_parent()
    }

    fn discard(&mut self) -> StorageResult<()> {
        self.staged = false;
        match fs::remove_file(&self.staged_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn has_staged(&self) -> bool {
        self.staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path(), "snap").unwrap();
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn stage_writes_sibling_only() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path(), "snap").unwrap();
        backend.stage(b"hello").unwrap();

        assert!(dir.path().join("snap.tmp").exists());
        assert!(!dir.path().join("snap").exists());
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn commit_replaces_target() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path(), "snap").unwrap();
        backend.stage(b"one").unwrap();
        backend.commit().unwrap();
        backend.stage(b"two").unwrap();
        backend.commit().unwrap();

        assert_eq!(backend.load().unwrap().unwrap(), b"two");
        assert!(!dir.path().join("snap.tmp").exists());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut backend = FileBackend::open(dir.path(), "snap").unwrap();
            backend.stage(b"persisted").unwrap();
            backend.commit().unwrap();
        }
        let backend = FileBackend::open(dir.path(), "snap").unwrap();
        assert_eq!(backend.load().unwrap().unwrap(), b"persisted");
    }

    #[test]
    fn open_removes_interrupted_stage() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("snap"), b"good").unwrap();
        fs::write(dir.path().join("snap.tmp"), b"half-written").unwrap();

        let mut backend = FileBackend::open(dir.path(), "snap").unwrap();
        assert!(!dir.path().join("snap.tmp").exists());
        assert!(!backend.has_staged());
        assert!(matches!(backend.commit(), Err(StorageError::NothingStaged)));
        assert_eq!(backend.load().unwrap().unwrap(), b"good");
    }

    #[test]
    fn discard_removes_staged_file() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path(), "snap").unwrap();
        backend.stage(b"x").unwrap();
        backend.discard().unwrap();
        assert!(!dir.path().join("snap.tmp").exists());
        backend.discard().unwrap();
    }

    #[test]
    fn open_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = FileBackend::open(&nested, "snap").unwrap();
        assert!(nested.is_dir());
        assert_eq!(backend.path(), nested.join("snap"));
    }
}
