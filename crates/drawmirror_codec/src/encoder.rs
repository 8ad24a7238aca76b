//! Canonical CBOR encoder.

use crate::decoder::MAX_DEPTH;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to canonical CBOR bytes.
///
/// Output follows the deterministic encoding rules of RFC 8949 §4.2.1:
/// shortest-form integer heads, definite lengths only, and map entries
/// ordered by their encoded key (length-first, then bytewise). Floats are
/// always written as 8-byte doubles so that a number has exactly one
/// encoding.
///
/// # Errors
///
/// Returns [`CodecError::NaNForbidden`] if the tree contains a NaN or
/// infinite float, and [`CodecError::DepthLimitExceeded`] if arrays and maps
/// nest deeper than the decoder accepts.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder writing into an owned buffer.
///
/// Several values may be encoded back to back; the archive writer uses this
/// to stream records into one payload without intermediate allocations.
///
/// Containers opened with [`begin_array`](Self::begin_array) or
/// [`begin_map`](Self::begin_map) count towards the nesting depth until
/// closed with [`end`](Self::end), so streamed output obeys the same depth
/// limit as [`from_cbor`](crate::from_cbor).
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    /// Encode a value, appending to the buffer.
    ///
    /// # Errors
    ///
    /// `NaNForbidden` for non-finite floats, `EncodingFailed` for duplicate
    /// map keys, `DepthLimitExceeded` past the decoder's nesting limit.
    /// Bytes written before the error stay in the buffer.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(false) => self.buffer.push(0xf4),
            Value::Bool(true) => self.buffer.push(0xf5),
            Value::Integer(n) => self.write_integer(*n),
            Value::Float(f) => self.write_float(*f)?,
            Value::Bytes(b) => {
                self.write_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.write_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.enter()?;
                self.write_head(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
                self.depth -= 1;
            }
            Value::Map(pairs) => {
                self.enter()?;
                self.write_map(pairs)?;
                self.depth -= 1;
            }
        }
        Ok(())
    }

    /// Writes an array header; the caller encodes `len` items afterwards
    /// and then calls [`end`](Self::end).
    ///
    /// # Errors
    ///
    /// `DepthLimitExceeded` if the array would nest too deep.
    pub fn begin_array(&mut self, len: usize) -> CodecResult<()> {
        self.enter()?;
        self.write_head(4, len as u64);
        Ok(())
    }

    /// Writes a map header; the caller encodes `len` key/value pairs
    /// afterwards, already in canonical key order, and then calls
    /// [`end`](Self::end).
    ///
    /// # Errors
    ///
    /// `DepthLimitExceeded` if the map would nest too deep.
    pub fn begin_map(&mut self, len: usize) -> CodecResult<()> {
        self.enter()?;
        self.write_head(5, len as u64);
        Ok(())
    }

    /// Closes the innermost container opened with `begin_array` or
    /// `begin_map`.
    pub fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn enter(&mut self) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::DepthLimitExceeded {
                max_depth: MAX_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_head(0, n as u64);
        } else {
            // Negative n is carried as -1 - n, which never overflows.
            self.write_head(1, (-1 - n) as u64);
        }
    }

    fn write_float(&mut self, f: f64) -> CodecResult<()> {
        if !f.is_finite() {
            return Err(CodecError::NaNForbidden);
        }
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major_type: u8, arg: u64) {
        let mt = major_type << 5;
        if arg < 24 {
            self.buffer.push(mt | arg as u8);
        } else if arg <= u64::from(u8::MAX) {
            self.buffer.extend_from_slice(&[mt | 24, arg as u8]);
        } else if arg <= u64::from(u16::MAX) {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(arg as u16).to_be_bytes());
        } else if arg <= u64::from(u32::MAX) {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(arg as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&arg.to_be_bytes());
        }
    }

    fn write_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        // Keys are ordered by their encoded bytes, whatever order the caller
        // built the map in.
        // Keys sit at the map's own depth, as the decoder sees them.
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let mut key_encoder = CanonicalEncoder {
                buffer: Vec::new(),
                depth: self.depth,
            };
            key_encoder.encode(key)?;
            entries.push((key_encoder.buffer, value));
        }
        entries.sort_by(|a, b| compare_encoded(&a.0, &b.0));
        if entries
            .windows(2)
            .any(|w| w[0].0 == w[1].0)
        {
            return Err(CodecError::encoding_failed("duplicate map key"));
        }

        self.write_head(5, entries.len() as u64);
        for (key_bytes, value) in entries {
            self.buffer.extend_from_slice(&key_bytes);
            self.encode(value)?;
        }
        Ok(())
    }
}

/// Length-first, then bytewise ordering of encoded items.
pub(crate) fn compare_encoded(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
