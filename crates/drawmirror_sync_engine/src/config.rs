//! Configuration for pulls.

use drawmirror_sync_protocol::EXPORT_PATH;
use std::time::Duration;

/// Configuration for pull operations.
///
/// Pulls are never retried automatically; a failed pull is repeated only
/// when the operator asks again.
#[derive(Debug, Clone)]
pub struct PullConfig {
    /// Timeout for the whole export request.
    pub timeout: Duration,
    /// Path of the export endpoint on the peer.
    pub export_path: String,
    /// Reject responses whose content type is not the archive type.
    pub require_archive_content_type: bool,
    /// Cross-check manifest headers against the archive trailer.
    pub verify_manifest_headers: bool,
}

impl PullConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the export path.
    pub fn with_export_path(mut self, path: impl Into<String>) -> Self {
        self.export_path = path.into();
        self
    }

    /// Sets whether the archive content type is required.
    pub fn with_require_archive_content_type(mut self, value: bool) -> Self {
        self.require_archive_content_type = value;
        self
    }

    /// Sets whether manifest headers are cross-checked.
    pub fn with_verify_manifest_headers(mut self, value: bool) -> Self {
        self.verify_manifest_headers = value;
        self
    }
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            export_path: EXPORT_PATH.to_string(),
            require_archive_content_type: true,
            verify_manifest_headers: true,
        }
    }
}
