//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `commit` was called without a staged snapshot.
    #[error("no staged snapshot to commit")]
    NothingStaged,

    /// A fault injected by [`crate::FaultInjectingBackend`].
    #[error("injected fault during {step}")]
    Injected {
        /// The step that was made to fail.
        step: &'static str,
    },
}
