//! Immutable dataset versions.

use crate::drawing::Drawing;
use crate::error::{CoreError, CoreResult};
use crate::types::DrawingId;
use std::collections::BTreeMap;

/// The full set of drawings at one point in time.
///
/// A `Dataset` is never modified after it is published by the store.
/// Writers build a new one and swap it in, so holders of an
/// `Arc<Dataset>` always see a complete version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    drawings: BTreeMap<DrawingId, Drawing>,
    generation: u64,
}

impl Dataset {
    /// Creates an empty dataset at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from drawings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if two drawings share an ID.
    pub fn from_drawings(
        drawings: impl IntoIterator<Item = Drawing>,
        generation: u64,
    ) -> CoreResult<Self> {
        let mut map = BTreeMap::new();
        for drawing in drawings {
            let id = drawing.id;
            if map.insert(id, drawing).is_some() {
                return Err(CoreError::invalid_input(format!("duplicate drawing id {id}")));
            }
        }
        Ok(Self {
            drawings: map,
            generation,
        })
    }

    /// Local version counter; bumped by every committed write or replace.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of drawings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drawings.len()
    }

    /// Returns true if there are no drawings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drawings.is_empty()
    }

    /// Looks up a drawing.
    #[must_use]
    pub fn get(&self, id: &DrawingId) -> Option<&Drawing> {
        self.drawings.get(id)
    }

    /// Returns true if the drawing exists.
    #[must_use]
    pub fn contains(&self, id: &DrawingId) -> bool {
        self.drawings.contains_key(id)
    }

    /// Iterates drawings in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Drawing> {
        self.drawings.values()
    }

    /// IDs in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<DrawingId> {
        self.drawings.keys().copied().collect()
    }

    /// Returns true if both datasets hold the same drawings, ignoring
    /// generation.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.drawings == other.drawings
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub(crate) fn upsert(&mut self, drawing: Drawing) {
        self.drawings.insert(drawing.id, drawing);
    }

    pub(crate) fn remove(&mut self, id: &DrawingId) -> Option<Drawing> {
        self.drawings.remove(id)
    }
}
