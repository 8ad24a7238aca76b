//! Core type definitions for drawmirror.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a drawing.
///
/// Drawing IDs are random v4 UUIDs. They are rendered as lowercase
/// hyphenated text, and byte order matches the order of that text, so an
/// archive sorted by ID is sorted the same way whichever form is compared.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawingId([u8; 16]);

impl DrawingId {
    /// Creates a new random drawing ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Creates a drawing ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses the hyphenated text form.
    ///
    /// Returns `None` for anything that is not a UUID.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(|u| Self(u.into_bytes()))
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }
}

impl Default for DrawingId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for DrawingId {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::CoreError::invalid_input(format!("not a drawing id: {s}")))
    }
}

impl fmt::Debug for DrawingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DrawingId({})", self.to_uuid())
    }
}

impl fmt::Display for DrawingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uuid().hyphenated())
    }
}

impl From<Uuid> for DrawingId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

/// Current wall-clock time in Unix milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        assert_ne!(DrawingId::new(), DrawingId::new());
    }

    #[test]
    fn text_roundtrip() {
        let id = DrawingId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(DrawingId::parse(&text), Some(id));
        assert_eq!(text.parse::<DrawingId>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(DrawingId::parse("not-a-uuid").is_none());
        assert!("".parse::<DrawingId>().is_err());
    }

    #[test]
    fn byte_order_matches_text_order() {
        let mut ids: Vec<DrawingId> = (0..64).map(|_| DrawingId::new()).collect();
        let mut texts: Vec<String> = ids.iter().map(ToString::to_string).collect();
        ids.sort();
        texts.sort();
        let sorted: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, texts);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
