//! # Drawmirror Codec
//!
//! Typed attribute values and their canonical CBOR encoding.
//!
//! Drawing attribute bags are schema-less documents. This crate models them
//! as an explicit sum type ([`Value`]) and gives every value exactly one byte
//! representation, so that:
//! - Identical datasets produce identical archives
//! - Archive checksums are stable across instances and platforms
//! - A decoded archive re-encodes to the bytes it came from
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by key (length-first, then bytewise on encoded keys)
//! - Integers use shortest encoding
//! - Floats are always 8-byte doubles; NaN and infinities are rejected
//! - Strings must be UTF-8
//! - No indefinite-length items, no tags
//! - Arrays and maps nest at most [`MAX_DEPTH`] levels, on both sides
//!
//! ## Usage
//!
//! ```
//! use drawmirror_codec::{to_canonical_cbor, from_cbor, Value};
//!
//! let value = Value::text_map([("zoom", Value::Float(1.25))]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//!
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder, MAX_DEPTH};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
