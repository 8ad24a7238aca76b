//! In-memory snapshot backend.

use crate::backend::SnapshotBackend;
use crate::error::{StorageError, StorageResult};

/// A snapshot backend that keeps everything in process memory.
///
/// Used by tests and by instances started without a data directory.
/// Nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    current: Option<Vec<u8>>,
    staged: Option<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend whose current snapshot is `data`.
    pub fn with_snapshot(data: Vec<u8>) -> Self {
        Self {
            current: Some(data),
            staged: None,
        }
    }
}

impl SnapshotBackend for InMemoryBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.current.clone())
    }

    fn stage(&mut self, data: &[u8]) -> StorageResult<()> {
        self.staged = Some(data.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        let staged = self.staged.take().ok_or(StorageError::NothingStaged)?;
        self.current = Some(staged);
        Ok(())
    }

    fn discard(&mut self) -> StorageResult<()> {
        self.staged = None;
        Ok(())
    }

    fn has_staged(&self) -> bool {
        self.staged.is_some()
    }
}
