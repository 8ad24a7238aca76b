//! Test fixtures and instance helpers.
//!
//! Provides convenience functions for setting up test instances and the
//! archives a pull would receive.

use drawmirror_core::{
    Archive, Config, DatasetStore, Drawing, DrawingId, Instance, Node, NodeRegistry,
    ReplaceEngine, Value,
};
use drawmirror_storage::{FaultInjectingBackend, FaultPlan, InMemoryBackend};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test instance with automatic cleanup.
pub struct TestInstance {
    /// The instance.
    pub instance: Instance,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestInstance {
    /// Creates a new in-memory instance.
    pub fn memory() -> Self {
        Self {
            instance: Instance::in_memory(),
            temp_dir: None,
        }
    }

    /// Creates a new instance backed by a temporary data directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::new().data_dir(temp_dir.path().join("data"));
        let instance = Instance::open(&config).expect("Failed to open instance");
        Self {
            instance,
            temp_dir: Some(temp_dir),
        }
    }

    /// Creates an in-memory instance holding `count` drawings.
    pub fn populated(count: usize) -> Self {
        let test = Self::memory();
        test.fill(count, "local");
        test
    }

    /// Adds `count` drawings named `"{prefix} {i}"`.
    pub fn fill(&self, count: usize, prefix: &str) -> Vec<DrawingId> {
        (0..count)
            .map(|i| {
                let drawing = sample_drawing(&format!("{prefix} {i}"), i);
                let id = drawing.id;
                self.instance
                    .store()
                    .put(drawing)
                    .expect("Failed to add drawing");
                id
            })
            .collect()
    }

    /// Returns the data directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("data"))
    }

    /// Reopens a file-based instance from its data directory.
    ///
    /// The current instance is dropped first so the directory lock is free.
    pub fn reopen(self) -> Self {
        let Self { instance, temp_dir } = self;
        let temp_dir = temp_dir.expect("Only file instances can be reopened");
        drop(instance);
        let config = Config::new().data_dir(temp_dir.path().join("data"));
        Self {
            instance: Instance::open(&config).expect("Failed to reopen instance"),
            temp_dir: Some(temp_dir),
        }
    }

    /// Encodes this instance's dataset and registry as an archive.
    pub fn export_bytes(&self) -> Vec<u8> {
        let snapshot = self.instance.store().snapshot();
        Archive::from_dataset(&snapshot, &self.instance.registry().list())
            .encode()
            .expect("Failed to encode archive")
    }
}

impl std::ops::Deref for TestInstance {
    type Target = Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

/// A replace engine whose dataset backend fails on demand.
///
/// Returns the engine and the plan controlling the dataset backend.
pub fn faulty_engine() -> (ReplaceEngine, Arc<Mutex<FaultPlan>>) {
    let backend = FaultInjectingBackend::new(InMemoryBackend::new());
    let plan = backend.plan_handle();
    let store = DatasetStore::open(Box::new(backend)).expect("Failed to open store");
    let engine = ReplaceEngine::new(Arc::new(store), Arc::new(NodeRegistry::in_memory()));
    (engine, plan)
}

/// Builds a drawing with a couple of elements and a stable name.
pub fn sample_drawing(name: &str, seed: usize) -> Drawing {
    let mut drawing = Drawing::new_scene(DrawingId::new(), name, 1_700_000_000_000 + seed as u64);
    let elements: Vec<Value> = (0..=seed % 3)
        .map(|i| {
            Value::text_map([
                ("id", Value::from(format!("el-{seed}-{i}"))),
                ("type", Value::from("rectangle")),
                ("x", Value::Float(10.0 * i as f64)),
                ("y", Value::Float(5.5)),
                ("width", Value::Integer(100)),
            ])
        })
        .collect();
    drawing.data.insert("elements", Value::Array(elements));
    drawing
        .data
        .insert("appState", Value::text_map([("zoom", Value::Float(1.0))]));
    drawing
}

/// Builds a node entry registered at a fixed time.
pub fn sample_node(name: &str, endpoint: &str) -> Node {
    Node::new(name, endpoint, 1_700_000_000_000)
}

/// Builds an archive of `count` drawings and the given nodes.
pub fn sample_archive(count: usize, nodes: Vec<Node>) -> Archive {
    Archive {
        drawings: (0..count)
            .map(|i| sample_drawing(&format!("remote {i}"), i))
            .collect(),
        nodes,
    }
}

/// Encodes an archive of `count` drawings with no node entries.
pub fn sample_archive_bytes(count: usize) -> Vec<u8> {
    sample_archive(count, Vec::new())
        .encode()
        .expect("Failed to encode archive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawmirror_core::verify;

    #[test]
    fn populated_instance_has_drawings() {
        let test = TestInstance::populated(3);
        assert_eq!(test.store().len(), 3);
    }

    #[test]
    fn sample_archive_verifies() {
        let bytes = sample_archive_bytes(4);
        let manifest = verify(&bytes).unwrap();
        assert_eq!(manifest.record_count, 4);
    }

    #[test]
    fn file_instance_survives_reopen() {
        let test = TestInstance::file();
        test.fill(2, "kept");
        let test = test.reopen();
        assert_eq!(test.store().len(), 2);
    }
}
