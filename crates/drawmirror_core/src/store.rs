//! The local dataset store.
//!
//! The store owns the current [`Dataset`] behind an `Arc` and the backend
//! that persists it. Every write, a single drawing save or a whole-dataset
//! replace, follows the same path:
//!
//! 1. take the writer mutex (one writer at a time)
//! 2. build the next dataset from the current one, off to the side
//! 3. stage the encoded snapshot, then commit it (the commit point)
//! 4. swap the published `Arc` under a short write lock
//!
//! Readers clone the `Arc` under a short read lock and never see anything
//! but a complete, committed dataset.

use crate::archive::Archive;
use crate::dataset::Dataset;
use crate::drawing::Drawing;
use crate::error::{CoreError, CoreResult};
use crate::types::{now_millis, DrawingId};
use drawmirror_codec::Value;
use drawmirror_storage::{InMemoryBackend, SnapshotBackend};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Handle to the local dataset.
pub struct DatasetStore {
    current: RwLock<Arc<Dataset>>,
    writer: Mutex<Box<dyn SnapshotBackend>>,
}

impl DatasetStore {
    /// Opens the dataset persisted in `backend`.
    ///
    /// # Errors
    ///
    /// Returns an archive error if the stored snapshot does not decode, or a
    /// storage error if it cannot be read.
    pub fn open(backend: Box<dyn SnapshotBackend>) -> CoreResult<Self> {
        let dataset = match backend.load()? {
            Some(bytes) => Archive::decode(&bytes)?.into_dataset(0)?,
            None => Dataset::new(),
        };
        tracing::debug!(drawings = dataset.len(), "dataset loaded");
        Ok(Self {
            current: RwLock::new(Arc::new(dataset)),
            writer: Mutex::new(backend),
        })
    }

    /// Creates an empty store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(Arc::new(Dataset::new())),
            writer: Mutex::new(Box::new(InMemoryBackend::new())),
        }
    }

    /// Returns the current dataset.
    ///
    /// The read lock is held only long enough to clone the `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Dataset> {
        Arc::clone(&self.current.read())
    }

    /// Number of drawings in the current dataset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns true if the current dataset has no drawings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Creates an empty drawing named `name`.
    ///
    /// # Errors
    ///
    /// `ReplaceFailed` if the new dataset cannot be persisted.
    pub fn create(&self, name: &str) -> CoreResult<Drawing> {
        let drawing = Drawing::new_scene(DrawingId::new(), name, now_millis());
        let (created, _) = self.write(|current| {
            let mut next = current.clone();
            next.upsert(drawing.clone());
            Ok((next, drawing))
        })?;
        tracing::debug!(id = %created.id, "drawing created");
        Ok(created)
    }

    /// Inserts or replaces a complete drawing.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the attribute bag is not a map, `ReplaceFailed` if
    /// the new dataset cannot be persisted.
    pub fn put(&self, drawing: Drawing) -> CoreResult<()> {
        if !drawing.data.is_map() {
            return Err(CoreError::invalid_input("drawing data must be a map"));
        }
        self.write(|current| {
            let mut next = current.clone();
            next.upsert(drawing);
            Ok((next, ()))
        })?;
        Ok(())
    }

    /// Looks up a drawing.
    ///
    /// # Errors
    ///
    /// `NotFound` if the ID is unknown.
    pub fn get(&self, id: &DrawingId) -> CoreResult<Drawing> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::drawing_not_found(id))
    }

    /// All drawings in ascending ID order.
    #[must_use]
    pub fn list(&self) -> Vec<Drawing> {
        self.snapshot().iter().cloned().collect()
    }

    /// Applies an editor save to a drawing.
    ///
    /// Only `elements`, `appState`, `files` and `name` are taken from
    /// `patch`; every other key of the stored drawing is preserved.
    ///
    /// # Errors
    ///
    /// `NotFound` if the ID is unknown, `InvalidInput` if `patch` is not a
    /// map, `ReplaceFailed` if persisting fails.
    pub fn save(&self, id: &DrawingId, patch: &Value) -> CoreResult<Drawing> {
        if !patch.is_map() {
            return Err(CoreError::invalid_input("save patch must be a map"));
        }
        let (saved, _) = self.write(|current| {
            let mut drawing = current
                .get(id)
                .cloned()
                .ok_or_else(|| CoreError::drawing_not_found(id))?;
            drawing.apply_patch(patch, now_millis());
            let mut next = current.clone();
            next.upsert(drawing.clone());
            Ok((next, drawing))
        })?;
        Ok(saved)
    }

    /// Deletes a drawing.
    ///
    /// # Errors
    ///
    /// `NotFound` if the ID is unknown, `ReplaceFailed` if persisting fails.
    pub fn delete(&self, id: &DrawingId) -> CoreResult<()> {
        self.write(|current| {
            let mut next = current.clone();
            next.remove(id)
                .ok_or_else(|| CoreError::drawing_not_found(id))?;
            Ok((next, ()))
        })?;
        tracing::debug!(id = %id, "drawing deleted");
        Ok(())
    }

    /// Runs one serialised write.
    ///
    /// `build` sees the current dataset and returns its successor. The
    /// successor gets the next generation, is persisted, and is published
    /// only if persisting succeeded.
    pub(crate) fn write<R>(
        &self,
        build: impl FnOnce(&Dataset) -> CoreResult<(Dataset, R)>,
    ) -> CoreResult<(R, Arc<Dataset>)> {
        let mut backend = self.writer.lock();
        let current = self.snapshot();
        let (next, result) = build(&current)?;
        let next = Arc::new(next.with_generation(current.generation() + 1));

        persist(&mut **backend, &next, &current)?;

        *self.current.write() = Arc::clone(&next);
        Ok((result, next))
    }
}

impl std::fmt::Debug for DatasetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("DatasetStore")
            .field("drawings", &snapshot.len())
            .field("generation", &snapshot.generation())
            .finish_non_exhaustive()
    }
}

/// Stages and commits `next`, restoring `previous` if the commit fails.
fn persist(
    backend: &mut dyn SnapshotBackend,
    next: &Dataset,
    previous: &Dataset,
) -> CoreResult<()> {
    let bytes = Archive::from_dataset(next, &[]).encode()?;

    if let Err(e) = backend.stage(&bytes) {
        discard(backend);
        return Err(CoreError::replace_failed(
            format!("staging snapshot: {e}"),
            true,
        ));
    }

    if let Err(e) = backend.commit() {
        discard(backend);
        let rolled_back = restore(backend, previous);
        if !rolled_back {
            tracing::error!(
                error = %e,
                generation = next.generation(),
                "commit failed and previous snapshot could not be restored; durable state may hold the new dataset"
            );
        }
        return Err(CoreError::replace_failed(
            format!("committing snapshot: {e}"),
            rolled_back,
        ));
    }
    Ok(())
}

fn discard(backend: &mut dyn SnapshotBackend) {
    if let Err(e) = backend.discard() {
        tracing::warn!(error = %e, "could not discard staged snapshot");
    }
}

/// Makes sure the backend holds `previous` after a failed commit.
fn restore(backend: &mut dyn SnapshotBackend, previous: &Dataset) -> bool {
    let Ok(previous_bytes) = Archive::from_dataset(previous, &[]).encode() else {
        return false;
    };
    match backend.load() {
        Ok(None) => return true,
        Ok(Some(stored)) if stored == previous_bytes => return true,
        _ => {}
    }

    tracing::warn!("commit may have landed, re-writing previous snapshot");
    match backend.stage(&previous_bytes).and_then(|()| backend.commit()) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "re-writing previous snapshot failed");
            discard(backend);
            false
        }
    }
}
