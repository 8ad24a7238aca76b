//! Archive inspection: `verify` and `info`.

use super::CommandResult;
use drawmirror_core::{read_manifest, Archive, ArchiveManifest};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Archive description printed by `info`.
#[derive(Debug, Serialize)]
pub struct ArchiveInfo {
    /// File path.
    pub path: String,
    /// File size in bytes.
    pub size: usize,
    /// Format version.
    pub version: u16,
    /// Hex SHA-256 of the payload.
    pub checksum: String,
    /// Drawings in the archive.
    pub drawings: Vec<DrawingSummary>,
    /// Node entries in the archive.
    pub nodes: Vec<NodeSummary>,
}

/// One drawing in an archive.
#[derive(Debug, Serialize)]
pub struct DrawingSummary {
    /// Drawing ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Folder path.
    pub directory: String,
    /// Number of scene elements.
    pub elements: usize,
    /// Last modification, Unix milliseconds.
    pub modified_at: u64,
}

/// One node entry in an archive.
#[derive(Debug, Serialize)]
pub struct NodeSummary {
    /// Node name.
    pub name: String,
    /// Base URL.
    pub endpoint: String,
}

/// Fully validates an archive file.
pub fn verify(file: &Path) -> CommandResult {
    let bytes = fs::read(file)?;
    println!("Verifying {}", file.display());

    match drawmirror_core::verify(&bytes) {
        Ok(manifest) => {
            print_manifest(&manifest, bytes.len());
            println!("Status: OK");
            Ok(())
        }
        Err(e) => {
            // Show what the header claims even when the payload is bad.
            if let Ok(manifest) = read_manifest(&bytes) {
                print_manifest(&manifest, bytes.len());
            }
            println!("Status: INVALID");
            Err(e.into())
        }
    }
}

/// Describes the contents of an archive file.
pub fn info(file: &Path, format: &str) -> CommandResult {
    let bytes = fs::read(file)?;
    let manifest = read_manifest(&bytes)?;
    let archive = Archive::decode(&bytes)?;

    let info = ArchiveInfo {
        path: file.display().to_string(),
        size: bytes.len(),
        version: manifest.version,
        checksum: manifest.checksum_hex(),
        drawings: archive
            .drawings
            .iter()
            .map(|d| DrawingSummary {
                id: d.id.to_string(),
                name: d.name().to_string(),
                directory: d.directory().to_string(),
                elements: d.element_count(),
                modified_at: d.modified_at,
            })
            .collect(),
        nodes: archive
            .nodes
            .iter()
            .map(|n| NodeSummary {
                name: n.name.clone(),
                endpoint: n.endpoint.clone(),
            })
            .collect(),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        _ => print_text_output(&info),
    }
    Ok(())
}

fn print_manifest(manifest: &ArchiveManifest, size: usize) {
    println!("  Version:  {}", manifest.version);
    println!("  Records:  {}", manifest.record_count);
    println!("  Nodes:    {}", manifest.node_count);
    println!("  Payload:  {} bytes ({} total)", manifest.payload_len, size);
    println!("  Checksum: {}", manifest.checksum_hex());
}

fn print_text_output(info: &ArchiveInfo) {
    println!("Archive: {}", info.path);
    println!("  Version:  {}", info.version);
    println!("  Size:     {} bytes", info.size);
    println!("  Checksum: {}", info.checksum);
    println!();
    println!("Drawings ({}):", info.drawings.len());
    for d in &info.drawings {
        println!(
            "  {}  {:<24} {:<16} {:>5} elements",
            d.id, d.name, d.directory, d.elements
        );
    }
    if !info.nodes.is_empty() {
        println!();
        println!("Nodes ({}):", info.nodes.len());
        for n in &info.nodes {
            println!("  {:<20} {}", n.name, n.endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawmirror_testkit::{sample_archive, sample_node};
    use tempfile::TempDir;

    #[test]
    fn verify_and_info_accept_a_good_archive() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("good.archive");
        let archive = sample_archive(3, vec![sample_node("mirror", "http://b:3002")]);
        fs::write(&file, archive.encode().unwrap()).unwrap();

        verify(&file).unwrap();
        info(&file, "json").unwrap();
        info(&file, "text").unwrap();
    }

    #[test]
    fn verify_rejects_a_truncated_archive() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("short.archive");
        let bytes = drawmirror_testkit::sample_archive_bytes(3);
        fs::write(&file, &bytes[..bytes.len() - 10]).unwrap();

        assert!(verify(&file).is_err());
        assert!(info(&file, "text").is_err());
    }
}
