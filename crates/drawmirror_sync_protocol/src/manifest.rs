//! Manifest headers.
//!
//! The exporter repeats the archive manifest in response headers so a
//! puller can log what it is about to receive and cross-check the body.
//! The archive trailer stays authoritative; headers are optional.

use crate::error::{ProtocolError, ProtocolResult};
use drawmirror_core::ArchiveManifest;

/// Archive format version header.
pub const HEADER_VERSION: &str = "x-drawmirror-archive-version";
/// Record count header.
pub const HEADER_RECORD_COUNT: &str = "x-drawmirror-record-count";
/// Node count header.
pub const HEADER_NODE_COUNT: &str = "x-drawmirror-node-count";
/// Hex SHA-256 header.
pub const HEADER_CHECKSUM: &str = "x-drawmirror-checksum";

/// Manifest as carried in export response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportManifest {
    /// Archive format version.
    pub version: u16,
    /// Number of drawings.
    pub record_count: u32,
    /// Number of node entries.
    pub node_count: u32,
    /// Lowercase hex SHA-256 of the archive.
    pub checksum: String,
}

impl ExportManifest {
    /// Header pairs for an export response.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_VERSION, self.version.to_string()),
            (HEADER_RECORD_COUNT, self.record_count.to_string()),
            (HEADER_NODE_COUNT, self.node_count.to_string()),
            (HEADER_CHECKSUM, self.checksum.clone()),
        ]
    }

    /// Reads the manifest from response headers.
    ///
    /// `lookup` is called with lowercase header names. Returns `Ok(None)`
    /// when the peer sent no manifest headers at all.
    ///
    /// # Errors
    ///
    /// `InvalidHeader` if some headers are present but missing or
    /// malformed.
    pub fn from_headers<'a>(
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> ProtocolResult<Option<Self>> {
        let names = [
            HEADER_VERSION,
            HEADER_RECORD_COUNT,
            HEADER_NODE_COUNT,
            HEADER_CHECKSUM,
        ];
        if names.iter().all(|name| lookup(name).is_none()) {
            return Ok(None);
        }

        let checksum = required(&lookup, HEADER_CHECKSUM)?.trim().to_ascii_lowercase();
        if checksum.len() != 64 || hex::decode(&checksum).is_err() {
            return Err(ProtocolError::InvalidHeader {
                name: HEADER_CHECKSUM,
                value: checksum,
            });
        }

        Ok(Some(Self {
            version: parse(&lookup, HEADER_VERSION)?,
            record_count: parse(&lookup, HEADER_RECORD_COUNT)?,
            node_count: parse(&lookup, HEADER_NODE_COUNT)?,
            checksum,
        }))
    }

    /// Checks the headers against the manifest read from the body.
    ///
    /// # Errors
    ///
    /// `ManifestMismatch` naming the first field that differs.
    pub fn check(&self, archive: &ArchiveManifest) -> ProtocolResult<()> {
        let archive_checksum = archive.checksum_hex();
        let fields: [(&'static str, String, String); 4] = [
            ("checksum", self.checksum.clone(), archive_checksum),
            ("version", self.version.to_string(), archive.version.to_string()),
            (
                "record count",
                self.record_count.to_string(),
                archive.record_count.to_string(),
            ),
            (
                "node count",
                self.node_count.to_string(),
                archive.node_count.to_string(),
            ),
        ];
        for (field, header, body) in fields {
            if header != body {
                return Err(ProtocolError::ManifestMismatch {
                    field,
                    header,
                    archive: body,
                });
            }
        }
        Ok(())
    }
}

impl From<&ArchiveManifest> for ExportManifest {
    fn from(manifest: &ArchiveManifest) -> Self {
        Self {
            version: manifest.version,
            record_count: manifest.record_count,
            node_count: manifest.node_count,
            checksum: manifest.checksum_hex(),
        }
    }
}

fn required<'a>(
    lookup: &impl Fn(&str) -> Option<&'a str>,
    name: &'static str,
) -> ProtocolResult<&'a str> {
    lookup(name).ok_or(ProtocolError::InvalidHeader {
        name,
        value: String::new(),
    })
}

fn parse<'a, T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<&'a str>,
    name: &'static str,
) -> ProtocolResult<T> {
    let raw = required(lookup, name)?;
    raw.trim().parse().map_err(|_| ProtocolError::InvalidHeader {
        name,
        value: raw.to_string(),
    })
}
