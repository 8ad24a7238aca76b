//! Protocol errors.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while interpreting protocol metadata.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A header could not be parsed.
    #[error("invalid header {name}: {value:?}")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// Manifest headers disagree with the archive they accompany.
    #[error("manifest {field} mismatch: header {header}, archive {archive}")]
    ManifestMismatch {
        /// Which field differs.
        field: &'static str,
        /// Value from the headers.
        header: String,
        /// Value from the archive itself.
        archive: String,
    },
}
