//! Error types for the pull orchestrator.

use drawmirror_core::CoreError;
use thiserror::Error;

/// Errors a pull can end with.
///
/// Every variant except [`PullError::ReplaceFailed`] with `rolled_back`
/// unset means local state was not touched.
#[derive(Error, Debug)]
pub enum PullError {
    /// No node is registered under this name.
    #[error("unknown node: {name}")]
    UnknownNode {
        /// The name that was looked up.
        name: String,
    },

    /// Connection failure or timeout.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the request timed out.
        timed_out: bool,
    },

    /// The peer answered with a failure.
    #[error("remote error (HTTP {status}): {message}")]
    Remote {
        /// HTTP status.
        status: u16,
        /// Message from the peer, or a description of what was wrong.
        message: String,
    },

    /// The archive failed validation.
    #[error("corrupt archive: {message}")]
    CorruptArchive {
        /// First problem found.
        message: String,
    },

    /// The archive was written by a newer version.
    #[error("unsupported archive version {found} (this build reads up to {supported})")]
    UnsupportedVersion {
        /// Version in the archive.
        found: u16,
        /// Highest version understood.
        supported: u16,
    },

    /// Another pull is running on this instance.
    #[error("a pull is already in progress")]
    PullInProgress,

    /// Committing the new dataset failed.
    #[error("replace failed: {message} (rolled back: {rolled_back})")]
    ReplaceFailed {
        /// Description of the failure.
        message: String,
        /// Whether the previous dataset is intact.
        rolled_back: bool,
    },

    /// The pull was cancelled before the commit point.
    #[error("pull cancelled")]
    Cancelled,

    /// Any other local failure.
    #[error("local error: {0}")]
    Local(CoreError),
}

impl PullError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Creates a corrupt archive error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptArchive {
            message: message.into(),
        }
    }

    /// Returns true if local state is known to be unchanged.
    ///
    /// Only a replace that failed and could not restore the previous
    /// snapshot returns false; its state must be verified by the operator.
    pub fn is_safe_to_retry(&self) -> bool {
        !matches!(
            self,
            PullError::ReplaceFailed {
                rolled_back: false,
                ..
            }
        )
    }

    /// Returns true for failures that may succeed on a later,
    /// operator-initiated attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            PullError::Network { .. } | PullError::PullInProgress => true,
            PullError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            PullError::UnknownNode { .. } => "unknown_node",
            PullError::Network { .. } => "network",
            PullError::Remote { .. } => "remote",
            PullError::CorruptArchive { .. } => "corrupt_archive",
            PullError::UnsupportedVersion { .. } => "unsupported_version",
            PullError::PullInProgress => "pull_in_progress",
            PullError::ReplaceFailed { .. } => "replace_failed",
            PullError::Cancelled => "cancelled",
            PullError::Local(_) => "local",
        }
    }
}

impl From<CoreError> for PullError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CorruptArchive { message } => PullError::CorruptArchive { message },
            CoreError::UnsupportedVersion { found, supported } => {
                PullError::UnsupportedVersion { found, supported }
            }
            CoreError::ReplaceFailed {
                message,
                rolled_back,
            } => PullError::ReplaceFailed {
                message,
                rolled_back,
            },
            CoreError::NotFound { kind: "node", key } => PullError::UnknownNode { name: key },
            other => PullError::Local(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unrolled_replace_is_unsafe() {
        assert!(PullError::network("refused").is_safe_to_retry());
        assert!(PullError::corrupt("bad").is_safe_to_retry());
        assert!(PullError::ReplaceFailed {
            message: "disk".into(),
            rolled_back: true
        }
        .is_safe_to_retry());
        assert!(!PullError::ReplaceFailed {
            message: "disk".into(),
            rolled_back: false
        }
        .is_safe_to_retry());
    }

    #[test]
    fn transient_errors() {
        assert!(PullError::timeout("slow").is_transient());
        assert!(PullError::Remote {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!PullError::Remote {
            status: 404,
            message: String::new()
        }
        .is_transient());
        assert!(!PullError::Cancelled.is_transient());
    }

    #[test]
    fn core_errors_keep_their_kind() {
        let err: PullError = CoreError::corrupt("bad magic").into();
        assert_eq!(err.kind(), "corrupt_archive");

        let err: PullError = CoreError::UnsupportedVersion {
            found: 9,
            supported: 1,
        }
        .into();
        assert!(matches!(err, PullError::UnsupportedVersion { found: 9, .. }));

        let err: PullError = CoreError::node_not_found("mirror").into();
        assert!(matches!(err, PullError::UnknownNode { name } if name == "mirror"));
    }
}
