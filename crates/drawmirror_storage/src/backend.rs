//! Snapshot backend trait definition.

use crate::error::StorageResult;

/// A durable single-snapshot store with a two-phase replace.
///
/// # Invariants
///
/// - `load` returns the bytes of the last successful `commit`, or `None`
///   if nothing was ever committed
/// - `stage` never changes what `load` returns
/// - `commit` is atomic: after it returns `Ok`, `load` returns the staged
///   bytes; after it returns `Err`, `load` returns the previous bytes
/// - `discard` removes a staged snapshot and is a no-op without one
/// - Backends must be `Send + Sync` for concurrent access
pub trait SnapshotBackend: Send + Sync {
    /// Reads the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Durably writes `data` as the staged snapshot, replacing any earlier
    /// staged data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be written. The current
    /// snapshot is unaffected either way.
    fn stage(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Atomically promotes the staged snapshot to current.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NothingStaged`] without a prior
    /// `stage`, or an I/O error if the swap fails.
    fn commit(&mut self) -> StorageResult<()>;

    /// Removes any staged snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the staged data exists but cannot be removed.
    fn discard(&mut self) -> StorageResult<()>;

    /// Returns true if a staged snapshot is waiting for `commit`.
    fn has_staged(&self) -> bool;
}
