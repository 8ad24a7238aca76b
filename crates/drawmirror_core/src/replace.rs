//! Whole-dataset replacement.
//!
//! A replace swaps the entire local dataset for the drawings of a decoded
//! archive. It never deletes and re-inserts in place: the new dataset is
//! built separately, persisted through the store's stage/commit path and
//! published with a single reference swap. Concurrent readers observe
//! either the old or the new dataset.
//!
//! Node entries carried by the archive are merged into the local registry
//! after the swap. The merge only adds entries, so a node's own view of
//! the mesh survives any number of pulls.

use crate::archive::Archive;
use crate::dataset::Dataset;
use crate::error::CoreResult;
use crate::registry::NodeRegistry;
use crate::store::DatasetStore;
use std::sync::Arc;

/// What a replace did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Drawings in the new dataset.
    pub record_count: usize,
    /// Drawings in the dataset that was replaced.
    pub previous_count: usize,
    /// Generation of the new dataset.
    pub generation: u64,
    /// Registry entries added from the archive.
    pub nodes_added: Vec<String>,
    /// Set if merging registry entries failed after the dataset commit.
    pub registry_error: Option<String>,
}

/// Applies archives to a dataset store and node registry.
#[derive(Debug, Clone)]
pub struct ReplaceEngine {
    store: Arc<DatasetStore>,
    registry: Arc<NodeRegistry>,
}

impl ReplaceEngine {
    /// Creates an engine over the given store and registry.
    #[must_use]
    pub fn new(store: Arc<DatasetStore>, registry: Arc<NodeRegistry>) -> Self {
        Self { store, registry }
    }

    /// Returns the store this engine writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    /// Returns the registry archive nodes are merged into.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Replaces the local dataset with the archive's drawings.
    ///
    /// At most one replace (or local write) runs at a time; others wait on
    /// the store's writer lock.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the archive holds duplicate IDs (nothing changes)
    /// - `ReplaceFailed` if the new dataset cannot be committed; with
    ///   `rolled_back` set the previous dataset is fully intact
    ///
    /// A registry merge failure is not an error: the dataset commit has
    /// already happened, so it is logged and reported in the outcome.
    ///
    /// # Node merge
    ///
    /// Node entries carried by the archive are merged additively, so a pull
    /// can add registry entries the operator never typed in. An entry whose
    /// name or endpoint is already registered is skipped and nothing is ever
    /// removed or rewritten. The merged entries may include the source's own
    /// view of this instance. Exporters that should not spread their
    /// registry set `ExportConfig::include_nodes` to false, and an archive
    /// with no nodes leaves the registry untouched.
    pub fn replace(&self, archive: Archive) -> CoreResult<ReplaceOutcome> {
        let Archive { drawings, nodes } = archive;
        let incoming = Dataset::from_drawings(drawings, 0)?;
        let record_count = incoming.len();

        let (previous_count, published) = self
            .store
            .write(|current| Ok((incoming, current.len())))?;

        let (nodes_added, registry_error) = if nodes.is_empty() {
            (Vec::new(), None)
        } else {
            match self.registry.merge(&nodes) {
                Ok(added) => (added, None),
                Err(e) => {
                    tracing::warn!(error = %e, "dataset replaced but registry merge failed");
                    (Vec::new(), Some(e.to_string()))
                }
            }
        };

        tracing::info!(
            records = record_count,
            previous = previous_count,
            generation = published.generation(),
            nodes_added = nodes_added.len(),
            "dataset replaced"
        );

        Ok(ReplaceOutcome {
            record_count,
            previous_count,
            generation: published.generation(),
            nodes_added,
            registry_error,
        })
    }
}
