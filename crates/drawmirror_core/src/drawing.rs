//! Drawings and their attribute bags.

use crate::types::DrawingId;
use drawmirror_codec::Value;

/// Attribute keys a save is allowed to change.
pub const SAVE_KEYS: [&str; 4] = ["elements", "appState", "files", "name"];

/// Name given to drawings that carry none.
pub const DEFAULT_NAME: &str = "Untitled";

/// Directory given to drawings that carry none.
pub const DEFAULT_DIRECTORY: &str = "/";

/// A single drawing.
///
/// `data` is the schema-less attribute bag produced by the editor: scene
/// elements, app state, embedded files and metadata. It is always a map.
/// Keys this crate does not know about are kept untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    /// Stable identity.
    pub id: DrawingId,
    /// Attribute bag (a [`Value::Map`]).
    pub data: Value,
    /// Last modification, Unix milliseconds.
    pub modified_at: u64,
}

impl Drawing {
    /// Creates an empty scene named `name`.
    pub fn new_scene(id: DrawingId, name: &str, modified_at: u64) -> Self {
        let data = Value::text_map([
            ("name", Value::from(name)),
            ("directory", Value::from(DEFAULT_DIRECTORY)),
            ("elements", Value::Array(Vec::new())),
            ("appState", Value::empty_map()),
            ("files", Value::empty_map()),
        ]);
        Self {
            id,
            data,
            modified_at,
        }
    }

    /// Display name, `"Untitled"` when absent.
    pub fn name(&self) -> &str {
        self.text_attr("name").unwrap_or(DEFAULT_NAME)
    }

    /// Folder path, `"/"` when absent.
    pub fn directory(&self) -> &str {
        self.text_attr("directory").unwrap_or(DEFAULT_DIRECTORY)
    }

    /// Free-form description, empty when absent.
    pub fn description(&self) -> &str {
        self.text_attr("description").unwrap_or("")
    }

    /// Number of scene elements.
    pub fn element_count(&self) -> usize {
        self.data
            .get("elements")
            .and_then(Value::as_array)
            .map_or(0, <[Value]>::len)
    }

    /// Copies the savable keys present in `patch` into this drawing.
    ///
    /// Returns the number of keys copied. Other keys in `patch` are ignored.
    pub fn apply_patch(&mut self, patch: &Value, modified_at: u64) -> usize {
        let mut applied = 0;
        for key in SAVE_KEYS {
            if let Some(value) = patch.get(key) {
                self.data.insert(key, value.clone());
                applied += 1;
            }
        }
        self.modified_at = modified_at;
        applied
    }

    fn text_attr(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_scene_has_expected_shape() {
        let drawing = Drawing::new_scene(DrawingId::new(), "Plan", 7);
        assert_eq!(drawing.name(), "Plan");
        assert_eq!(drawing.directory(), "/");
        assert_eq!(drawing.description(), "");
        assert_eq!(drawing.element_count(), 0);
        assert!(drawing.data.get("appState").unwrap().is_map());
        assert!(drawing.data.get("files").unwrap().is_map());
    }

    #[test]
    fn accessors_default_when_missing() {
        let drawing = Drawing {
            id: DrawingId::new(),
            data: Value::empty_map(),
            modified_at: 0,
        };
        assert_eq!(drawing.name(), "Untitled");
        assert_eq!(drawing.directory(), "/");
    }

    #[test]
    fn patch_touches_only_savable_keys() {
        let mut drawing = Drawing::new_scene(DrawingId::new(), "Plan", 1);
        drawing.data.insert("description", Value::from("keep me"));

        let patch = Value::text_map([
            ("elements", Value::Array(vec![Value::from("rect")])),
            ("name", Value::from("Renamed")),
            ("description", Value::from("ignored")),
            ("directory", Value::from("/elsewhere")),
        ]);
        let applied = drawing.apply_patch(&patch, 99);

        assert_eq!(applied, 2);
        assert_eq!(drawing.name(), "Renamed");
        assert_eq!(drawing.element_count(), 1);
        assert_eq!(drawing.description(), "keep me");
        assert_eq!(drawing.directory(), "/");
        assert_eq!(drawing.modified_at, 99);
    }
}
