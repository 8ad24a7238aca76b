//! Portable dataset archives.
//!
//! An archive is the transfer format of a pull and the on-disk format of a
//! dataset snapshot. It is self-contained and versioned, and a trailing
//! checksum covers every byte before it.
//!
//! ## Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! | magic "DMAR" (4) | version (2) | record_count (4) | node_count (4) | payload_len (8) |
//! | payload: canonical CBOR {"drawings": [...], "nodes": [...]} (payload_len)           |
//! | sha256(header || payload) (32)                                                      |
//! ```
//!
//! Records are `{"id", "modified_at", "data"}` maps in strictly ascending ID
//! order; node entries are `{"name", "endpoint", "registered_at"}` maps in
//! strictly ascending name order. Nothing time-dependent is written, so
//! equal datasets always encode to equal bytes.
//!
//! ## Usage
//!
//! ```
//! use drawmirror_core::{Archive, Dataset};
//!
//! let archive = Archive::from_dataset(&Dataset::new(), &[]);
//! let bytes = archive.encode().unwrap();
//! let decoded = Archive::decode(&bytes).unwrap();
//! assert_eq!(decoded.record_count(), 0);
//! ```

use crate::dataset::Dataset;
use crate::drawing::Drawing;
use crate::error::{CoreError, CoreResult};
use crate::node::Node;
use crate::types::DrawingId;
use drawmirror_codec::{from_cbor, CanonicalEncoder, CodecError, Value, MAX_DEPTH};
use sha2::{Digest, Sha256};

/// Magic bytes at the start of every archive.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"DMAR";
/// Newest archive format version this build reads and the one it writes.
pub const ARCHIVE_VERSION: u16 = 1;
/// Header size (magic + version + record_count + node_count + payload_len).
pub const HEADER_SIZE: usize = 4 + 2 + 4 + 4 + 8;
/// Trailer size (SHA-256).
pub const CHECKSUM_SIZE: usize = 32;
/// Containers around a drawing's attribute bag: root map, drawings array,
/// record map.
const ENVELOPE_DEPTH: usize = 3;
/// Deepest attribute bag an archive can carry, counting the bag itself.
pub const MAX_ATTRIBUTE_DEPTH: usize = MAX_DEPTH - ENVELOPE_DEPTH;

/// Header and trailer facts, readable without parsing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveManifest {
    /// Format version.
    pub version: u16,
    /// Number of drawing records.
    pub record_count: u32,
    /// Number of node entries.
    pub node_count: u32,
    /// Payload size in bytes.
    pub payload_len: u64,
    /// SHA-256 over header and payload.
    pub checksum: [u8; 32],
}

impl ArchiveManifest {
    /// Lowercase hex rendering of the checksum.
    #[must_use]
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }

    /// Total archive size this manifest describes.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        ((HEADER_SIZE + CHECKSUM_SIZE) as u64).saturating_add(self.payload_len)
    }
}

/// A decoded archive: drawings plus the exporter's node registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    /// Drawings in ascending ID order.
    pub drawings: Vec<Drawing>,
    /// Registry entries in ascending name order.
    pub nodes: Vec<Node>,
}

impl Archive {
    /// Captures a dataset and a set of nodes.
    #[must_use]
    pub fn from_dataset(dataset: &Dataset, nodes: &[Node]) -> Self {
        let mut nodes = nodes.to_vec();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            drawings: dataset.iter().cloned().collect(),
            nodes,
        }
    }

    /// Number of drawing records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.drawings.len()
    }

    /// Converts the drawings into a dataset at `generation`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if two drawings share an ID.
    pub fn into_dataset(self, generation: u64) -> CoreResult<Dataset> {
        Dataset::from_drawings(self.drawings, generation)
    }

    /// Encodes the archive.
    ///
    /// Records and nodes are sorted before writing, whatever order they are
    /// held in.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on duplicate IDs or node names, a non-map
    /// attribute bag, a bag nested deeper than [`MAX_ATTRIBUTE_DEPTH`] or a
    /// timestamp above `i64::MAX`, and `Codec` if a bag holds a non-finite
    /// float.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut drawings: Vec<&Drawing> = self.drawings.iter().collect();
        drawings.sort_by_key(|d| d.id);
        if let Some(w) = drawings.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(CoreError::invalid_input(format!(
                "duplicate drawing id {}",
                w[0].id
            )));
        }

        let mut nodes: Vec<&Node> = self.nodes.iter().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(w) = nodes.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(CoreError::invalid_input(format!(
                "duplicate node name {}",
                w[0].name
            )));
        }

        let record_count = u32::try_from(drawings.len())
            .map_err(|_| CoreError::invalid_input("too many drawings for one archive"))?;
        let node_count = u32::try_from(nodes.len())
            .map_err(|_| CoreError::invalid_input("too many nodes for one archive"))?;

        // "nodes" sorts before "drawings": canonical order is length-first.
        let mut encoder = CanonicalEncoder::new();
        encoder.begin_map(2)?;
        encoder.encode(&Value::from("nodes"))?;
        encoder.begin_array(nodes.len())?;
        for node in nodes {
            encoder.encode(&node_to_value(node)?)?;
        }
        encoder.end();
        encoder.encode(&Value::from("drawings"))?;
        encoder.begin_array(drawings.len())?;
        for drawing in drawings {
            if !drawing.data.is_map() {
                return Err(CoreError::invalid_input(format!(
                    "drawing {} has a non-map attribute bag",
                    drawing.id
                )));
            }
            // The record sits below the root map and the drawings array.
            encoder
                .encode(&drawing_to_value(drawing)?)
                .map_err(|e| match e {
                    CodecError::DepthLimitExceeded { .. } => CoreError::invalid_input(format!(
                        "drawing {} nests deeper than {MAX_ATTRIBUTE_DEPTH} levels",
                        drawing.id
                    )),
                    other => other.into(),
                })?;
        }
        encoder.end();
        encoder.end();
        let payload = encoder.into_bytes();

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
        data.extend_from_slice(&ARCHIVE_MAGIC);
        data.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
        data.extend_from_slice(&record_count.to_le_bytes());
        data.extend_from_slice(&node_count.to_le_bytes());
        data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        data.extend_from_slice(&payload);

        let checksum = Sha256::digest(&data);
        data.extend_from_slice(&checksum);
        Ok(data)
    }

    /// Decodes and fully validates an archive.
    ///
    /// Nothing is returned unless every check passes.
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion` if the archive is newer than [`ARCHIVE_VERSION`]
    /// - `CorruptArchive` for any structural, length, checksum or record
    ///   problem
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let manifest = read_manifest(data)?;
        check_length(data, &manifest)?;
        check_checksum(data, &manifest)?;

        let payload = &data[HEADER_SIZE..data.len() - CHECKSUM_SIZE];
        let root = from_cbor(payload)
            .map_err(|e| CoreError::corrupt(format!("payload is not canonical CBOR: {e}")))?;

        let fields = root
            .as_map()
            .ok_or_else(|| CoreError::corrupt("payload is not a map"))?;
        if fields.len() != 2 {
            return Err(CoreError::corrupt("payload must hold exactly drawings and nodes"));
        }
        let drawing_values = root
            .get("drawings")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::corrupt("missing drawings array"))?;
        let node_values = root
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::corrupt("missing nodes array"))?;

        if drawing_values.len() != manifest.record_count as usize {
            return Err(CoreError::corrupt(format!(
                "record count mismatch: header says {}, payload has {}",
                manifest.record_count,
                drawing_values.len()
            )));
        }
        if node_values.len() != manifest.node_count as usize {
            return Err(CoreError::corrupt(format!(
                "node count mismatch: header says {}, payload has {}",
                manifest.node_count,
                node_values.len()
            )));
        }

        let mut drawings = Vec::with_capacity(drawing_values.len());
        for (index, value) in drawing_values.iter().enumerate() {
            let drawing = drawing_from_value(value)
                .map_err(|e| CoreError::corrupt(format!("record {index}: {e}")))?;
            if let Some(prev) = drawings.last().map(|d: &Drawing| d.id) {
                if prev >= drawing.id {
                    return Err(CoreError::corrupt(format!(
                        "record {index}: ids not strictly ascending"
                    )));
                }
            }
            drawings.push(drawing);
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(node_values.len());
        for (index, value) in node_values.iter().enumerate() {
            let node = node_from_value(value)
                .map_err(|e| CoreError::corrupt(format!("node {index}: {e}")))?;
            if let Some(prev) = nodes.last() {
                if prev.name >= node.name {
                    return Err(CoreError::corrupt(format!(
                        "node {index}: names not strictly ascending"
                    )));
                }
            }
            nodes.push(node);
        }

        Ok(Self { drawings, nodes })
    }
}

/// Reads the manifest from the header and trailer.
///
/// Only magic and version are validated; use [`verify`] to check the rest.
///
/// # Errors
///
/// `CorruptArchive` if the data is too short or the magic is wrong,
/// `UnsupportedVersion` for a newer format.
pub fn read_manifest(data: &[u8]) -> CoreResult<ArchiveManifest> {
    if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(CoreError::corrupt(format!(
            "archive too short: {} bytes",
            data.len()
        )));
    }
    if data[0..4] != ARCHIVE_MAGIC {
        return Err(CoreError::corrupt("invalid archive magic"));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version == 0 {
        return Err(CoreError::corrupt("archive version 0 is not valid"));
    }
    if version > ARCHIVE_VERSION {
        return Err(CoreError::UnsupportedVersion {
            found: version,
            supported: ARCHIVE_VERSION,
        });
    }

    let record_count = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
    let node_count = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[14..22]);
    let payload_len = u64::from_le_bytes(len_bytes);

    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(&data[data.len() - CHECKSUM_SIZE..]);

    Ok(ArchiveManifest {
        version,
        record_count,
        node_count,
        payload_len,
        checksum,
    })
}

/// Fully validates an archive and returns its manifest.
///
/// # Errors
///
/// Same as [`Archive::decode`].
pub fn verify(data: &[u8]) -> CoreResult<ArchiveManifest> {
    let manifest = read_manifest(data)?;
    Archive::decode(data)?;
    Ok(manifest)
}

fn check_length(data: &[u8], manifest: &ArchiveManifest) -> CoreResult<()> {
    if manifest.total_len() != data.len() as u64 {
        return Err(CoreError::corrupt(format!(
            "length mismatch: header declares {} payload bytes, archive is {} bytes",
            manifest.payload_len,
            data.len()
        )));
    }
    Ok(())
}

fn check_checksum(data: &[u8], manifest: &ArchiveManifest) -> CoreResult<()> {
    let computed = Sha256::digest(&data[..data.len() - CHECKSUM_SIZE]);
    if computed.as_slice() != manifest.checksum {
        return Err(CoreError::corrupt(format!(
            "checksum mismatch: trailer {}, computed {}",
            manifest.checksum_hex(),
            hex::encode(computed)
        )));
    }
    Ok(())
}

fn timestamp(millis: u64, what: &str) -> CoreResult<Value> {
    i64::try_from(millis)
        .map(Value::Integer)
        .map_err(|_| CoreError::invalid_input(format!("{what} out of range: {millis}")))
}

fn drawing_to_value(drawing: &Drawing) -> CoreResult<Value> {
    Ok(Value::text_map([
        ("id", Value::Text(drawing.id.to_string())),
        ("modified_at", timestamp(drawing.modified_at, "modified_at")?),
        ("data", drawing.data.clone()),
    ]))
}

fn node_to_value(node: &Node) -> CoreResult<Value> {
    Ok(Value::text_map([
        ("name", Value::Text(node.name.clone())),
        ("endpoint", Value::Text(node.endpoint.clone())),
        ("registered_at", timestamp(node.registered_at, "registered_at")?),
    ]))
}

fn drawing_from_value(value: &Value) -> Result<Drawing, String> {
    let fields = value.as_map().ok_or("not a map")?;
    if fields.len() != 3 {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    }
    let id_text = value
        .get("id")
        .and_then(Value::as_text)
        .ok_or("missing id")?;
    let id = DrawingId::parse(id_text).ok_or_else(|| format!("invalid id {id_text:?}"))?;
    let modified_at = value
        .get("modified_at")
        .and_then(Value::as_integer)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or("missing or negative modified_at")?;
    let data = value.get("data").ok_or("missing data")?;
    if !data.is_map() {
        return Err("data is not a map".to_string());
    }
    Ok(Drawing {
        id,
        data: data.clone(),
        modified_at,
    })
}

fn node_from_value(value: &Value) -> Result<Node, String> {
    let fields = value.as_map().ok_or("not a map")?;
    if fields.len() != 3 {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    }
    let name = value
        .get("name")
        .and_then(Value::as_text)
        .filter(|n| !n.is_empty())
        .ok_or("missing name")?;
    let endpoint = value
        .get("endpoint")
        .and_then(Value::as_text)
        .filter(|e| !e.is_empty())
        .ok_or("missing endpoint")?;
    let registered_at = value
        .get("registered_at")
        .and_then(Value::as_integer)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or("missing or negative registered_at")?;
    Ok(Node {
        name: name.to_string(),
        endpoint: endpoint.to_string(),
        registered_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drawing(byte: u8, name: &str) -> Drawing {
        let mut d = Drawing::new_scene(DrawingId::from_bytes([byte; 16]), name, 1_000 + u64::from(byte));
        d.data.insert("zoom", Value::Float(1.5));
        d
    }

    fn sample() -> Archive {
        let dataset =
            Dataset::from_drawings([drawing(2, "two"), drawing(1, "one"), drawing(3, "three")], 4)
                .unwrap();
        let nodes = [
            Node::new("zeta", "http://z", 5),
            Node::new("alpha", "http://a", 6),
        ];
        Archive::from_dataset(&dataset, &nodes)
    }

    #[test]
    fn decode_returns_what_was_encoded() {
        let archive = sample();
        let bytes = archive.encode().unwrap();
        let decoded = Archive::decode(&bytes).unwrap();

        assert_eq!(decoded, archive);
        assert_eq!(decoded.nodes[0].name, "alpha");
        assert_eq!(decoded.drawings[0].name(), "one");
    }

    /// An attribute bag `depth` levels deep, counting the bag itself.
    fn deep_bag(depth: usize) -> Value {
        let mut inner = Value::Null;
        for _ in 1..depth {
            inner = Value::Array(vec![inner]);
        }
        Value::text_map([("name", Value::from("deep")), ("elements", inner)])
    }

    #[test]
    fn deepest_encodable_bag_decodes() {
        let mut drawing = drawing(1, "deep");
        drawing.data = deep_bag(MAX_ATTRIBUTE_DEPTH);
        let archive = Archive {
            drawings: vec![drawing],
            nodes: vec![],
        };
        let bytes = archive.encode().unwrap();
        assert_eq!(Archive::decode(&bytes).unwrap(), archive);
    }

    #[test]
    fn too_deep_bag_is_refused_on_encode() {
        let mut drawing = drawing(1, "deep");
        drawing.data = deep_bag(MAX_ATTRIBUTE_DEPTH + 1);
        let archive = Archive {
            drawings: vec![drawing],
            nodes: vec![],
        };
        assert!(matches!(
            archive.encode(),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = sample();
        let mut b = sample();
        b.drawings.reverse();
        b.nodes.reverse();
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn manifest_reflects_header() {
        let bytes = sample().encode().unwrap();
        let manifest = read_manifest(&bytes).unwrap();
        assert_eq!(manifest.version, ARCHIVE_VERSION);
        assert_eq!(manifest.record_count, 3);
        assert_eq!(manifest.node_count, 2);
        assert_eq!(manifest.total_len(), bytes.len() as u64);
        assert_eq!(manifest.checksum_hex().len(), 64);
        assert_eq!(verify(&bytes).unwrap(), manifest);
    }

    #[test]
    fn empty_archive() {
        let bytes = Archive::from_dataset(&Dataset::new(), &[]).encode().unwrap();
        let decoded = Archive::decode(&bytes).unwrap();
        assert!(decoded.drawings.is_empty());
        assert!(decoded.nodes.is_empty());
    }

    #[test]
    fn future_version_rejected_before_checksum() {
        let mut bytes = sample().encode().unwrap();
        bytes[4..6].copy_from_slice(&(ARCHIVE_VERSION + 1).to_le_bytes());
        assert!(matches!(
            Archive::decode(&bytes),
            Err(CoreError::UnsupportedVersion { found, supported })
                if found == ARCHIVE_VERSION + 1 && supported == ARCHIVE_VERSION
        ));
    }

    #[test]
    fn version_zero_is_corrupt() {
        let mut bytes = sample().encode().unwrap();
        bytes[4..6].copy_from_slice(&0u16.to_le_bytes());
        assert!(matches!(
            Archive::decode(&bytes),
            Err(CoreError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            Archive::decode(&bytes),
            Err(CoreError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn duplicate_ids_refused_on_encode() {
        let archive = Archive {
            drawings: vec![drawing(1, "a"), drawing(1, "b")],
            nodes: Vec::new(),
        };
        assert!(matches!(
            archive.encode(),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn oversized_timestamp_is_rejected_on_encode() {
        let mut late = drawing(1, "a");
        late.modified_at = u64::MAX;
        let archive = Archive {
            drawings: vec![late],
            nodes: Vec::new(),
        };
        assert!(matches!(
            archive.encode(),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn well_checksummed_but_unsorted_payload_is_corrupt() {
        // Hand-build an archive whose records are out of order but whose
        // checksum is valid.
        let records = Value::Array(vec![
            drawing_to_value(&drawing(2, "b")).unwrap(),
            drawing_to_value(&drawing(1, "a")).unwrap(),
        ]);
        let payload = drawmirror_codec::to_canonical_cbor(&Value::text_map([
            ("drawings", records),
            ("nodes", Value::Array(Vec::new())),
        ]))
        .unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(&ARCHIVE_MAGIC);
        data.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        data.extend_from_slice(&payload);
        let checksum = Sha256::digest(&data);
        data.extend_from_slice(&checksum);

        let err = Archive::decode(&data).unwrap_err();
        assert!(err.to_string().contains("ascending"), "{err}");
    }

    proptest! {
        #[test]
        fn truncation_is_always_corrupt(cut in 1usize..200) {
            let bytes = sample().encode().unwrap();
            let keep = bytes.len().saturating_sub(cut);
            let is_corrupt = matches!(
                Archive::decode(&bytes[..keep]),
                Err(CoreError::CorruptArchive { .. })
            );
            prop_assert!(is_corrupt);
        }

        #[test]
        fn mutation_is_always_corrupt(pos in 0usize..4096, flip in 1u8..=255) {
            let mut bytes = sample().encode().unwrap();
            let pos = pos % bytes.len();
            // Bytes 4..6 hold the version tag, covered by its own test.
            prop_assume!(!(4..6).contains(&pos));
            bytes[pos] ^= flip;
            let is_corrupt = matches!(
                Archive::decode(&bytes),
                Err(CoreError::CorruptArchive { .. })
            );
            prop_assert!(is_corrupt);
        }
    }
}
