//! Error types for drawmirror core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in drawmirror core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] drawmirror_storage::StorageError),

    /// CBOR codec error outside of archive decoding.
    #[error("codec error: {0}")]
    Codec(#[from] drawmirror_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Archive failed structural validation. Nothing from it was used.
    #[error("corrupt archive: {message}")]
    CorruptArchive {
        /// Description of the first problem found.
        message: String,
    },

    /// Archive was written by a newer format version.
    #[error("unsupported archive version {found} (this build reads up to {supported})")]
    UnsupportedVersion {
        /// Version tag found in the archive header.
        found: u16,
        /// Highest version this build understands.
        supported: u16,
    },

    /// A node with this name is already registered.
    #[error("node already registered: {name}")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// A node with this endpoint is already registered.
    #[error("endpoint already registered by node {existing}: {endpoint}")]
    DuplicateEndpoint {
        /// The conflicting endpoint.
        endpoint: String,
        /// Name of the node that owns it.
        existing: String,
    },

    /// A named node or drawing does not exist.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// What was looked up ("node", "drawing").
        kind: &'static str,
        /// The key that was not found.
        key: String,
    },

    /// Caller supplied an unusable value.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// Persisting a new dataset failed.
    ///
    /// With `rolled_back` set the previous dataset is intact, in memory and
    /// on disk. Without it the durable copy may hold the new dataset while
    /// memory holds the old one.
    #[error("replace failed: {message} (rolled back: {rolled_back})")]
    ReplaceFailed {
        /// Description of the failure.
        message: String,
        /// Whether the previous state was restored.
        rolled_back: bool,
    },

    /// Persisted registry could not be parsed.
    #[error("invalid registry file: {message}")]
    InvalidRegistry {
        /// Parser message.
        message: String,
    },

    /// Data directory is owned by another process.
    #[error("data directory locked: another process has exclusive access")]
    Locked,
}

impl CoreError {
    /// Creates a corrupt archive error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptArchive {
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a node not found error.
    pub fn node_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "node",
            key: name.into(),
        }
    }

    /// Creates a drawing not found error.
    pub fn drawing_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "drawing",
            key: id.to_string(),
        }
    }

    /// Creates a replace failure.
    pub fn replace_failed(message: impl Into<String>, rolled_back: bool) -> Self {
        Self::ReplaceFailed {
            message: message.into(),
            rolled_back,
        }
    }

    /// Returns true if the error came from validating archive bytes.
    pub fn is_archive_error(&self) -> bool {
        matches!(
            self,
            Self::CorruptArchive { .. } | Self::UnsupportedVersion { .. }
        )
    }
}
