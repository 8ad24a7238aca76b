//! # Drawmirror Sync Protocol
//!
//! Wire-level agreements between an exporting and a pulling instance.
//!
//! This crate provides:
//! - The export endpoint path and archive content type
//! - Manifest headers sent alongside the archive body
//! - Operator-facing JSON messages (node registration, pull status)
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod manifest;
mod messages;

pub use error::{ProtocolError, ProtocolResult};
pub use manifest::{
    ExportManifest, HEADER_CHECKSUM, HEADER_NODE_COUNT, HEADER_RECORD_COUNT, HEADER_VERSION,
};
pub use messages::{
    AddNodeRequest, ErrorBody, HealthBody, NodeList, PullReport, PullState, PullStatus,
};

/// Path of the export endpoint on every instance.
pub const EXPORT_PATH: &str = "/export-data";

/// Content type of an archive body.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/vnd.drawmirror.archive";

/// Returns true if `content_type` names the archive format.
///
/// Parameters such as `; charset=` are ignored.
pub fn is_archive_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|t| t.eq_ignore_ascii_case(ARCHIVE_CONTENT_TYPE))
}
