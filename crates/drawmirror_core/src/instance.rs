//! A running instance: data directory, dataset and registry together.

use crate::config::Config;
use crate::dir::DataDir;
use crate::error::CoreResult;
use crate::registry::NodeRegistry;
use crate::replace::ReplaceEngine;
use crate::store::DatasetStore;
use std::sync::Arc;

/// Everything one instance owns.
///
/// The data directory lock is held for the lifetime of the instance.
#[derive(Debug)]
pub struct Instance {
    dir: Option<DataDir>,
    store: Arc<DatasetStore>,
    registry: Arc<NodeRegistry>,
}

impl Instance {
    /// Opens an instance as described by `config`.
    ///
    /// # Errors
    ///
    /// `Locked` if another owner holds the data directory, archive errors
    /// if the stored dataset is damaged, `InvalidRegistry` for a damaged
    /// registry file, I/O errors otherwise.
    pub fn open(config: &Config) -> CoreResult<Self> {
        let instance = match &config.data_dir {
            Some(path) => {
                let dir = DataDir::open(path, config.create_if_missing)?;
                let store = DatasetStore::open(Box::new(dir.dataset_backend()?))?;
                let registry = NodeRegistry::open(Box::new(dir.registry_backend()?))?;
                Self {
                    dir: Some(dir),
                    store: Arc::new(store),
                    registry: Arc::new(registry),
                }
            }
            None => Self::in_memory(),
        };

        if let Some(seed) = &config.seed_file {
            instance.registry.seed_from_file(seed)?;
        }

        tracing::info!(
            data_dir = ?config.data_dir,
            drawings = instance.store.len(),
            nodes = instance.registry.len(),
            "instance opened"
        );
        Ok(instance)
    }

    /// Creates an instance with nothing on disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            store: Arc::new(DatasetStore::in_memory()),
            registry: Arc::new(NodeRegistry::in_memory()),
        }
    }

    /// The dataset store.
    #[must_use]
    pub fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    /// The node registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// A replace engine over this instance's store and registry.
    #[must_use]
    pub fn replace_engine(&self) -> ReplaceEngine {
        ReplaceEngine::new(Arc::clone(&self.store), Arc::clone(&self.registry))
    }

    /// The data directory, if the instance is persistent.
    #[must_use]
    pub fn data_dir(&self) -> Option<&DataDir> {
        self.dir.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use tempfile::tempdir;

    #[test]
    fn persistent_instance_roundtrip() {
        let dir = tempdir().unwrap();
        let config = Config::new().data_dir(dir.path());
        {
            let instance = Instance::open(&config).unwrap();
            instance.store().create("kept").unwrap();
            instance.registry().add("mirror", "http://b").unwrap();
        }
        let instance = Instance::open(&config).unwrap();
        assert_eq!(instance.store().len(), 1);
        assert!(instance.registry().get("mirror").is_ok());
        assert!(instance.data_dir().is_some());
    }

    #[test]
    fn instance_holds_directory_lock() {
        let dir = tempdir().unwrap();
        let config = Config::new().data_dir(dir.path());
        let _first = Instance::open(&config).unwrap();
        assert!(matches!(Instance::open(&config), Err(CoreError::Locked)));
    }

    #[test]
    fn seed_applied_on_open() {
        let dir = tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(&seed, r#"[{"name":"mirror","url":"http://b"}]"#).unwrap();
        let instance = Instance::open(&Config::new().seed_file(&seed)).unwrap();
        assert_eq!(instance.registry().len(), 1);
    }

    #[test]
    fn damaged_dataset_refuses_to_open() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("dataset.archive"), b"garbage").unwrap();
        let result = Instance::open(&Config::new().data_dir(dir.path()));
        assert!(matches!(result, Err(CoreError::CorruptArchive { .. })));
    }
}
