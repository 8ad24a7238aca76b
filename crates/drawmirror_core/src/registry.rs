//! Durable registry of peer nodes.
//!
//! The registry maps node names to endpoints. It is loaded once when the
//! instance opens and persisted on every mutation as a JSON object:
//!
//! ```text
//! { "mirror": { "endpoint": "http://b:3002", "registeredAt": 1700000000000 } }
//! ```
//!
//! Mutations are copy-on-write: the new map is persisted first and only
//! then published, so a failed write leaves the in-memory registry exactly
//! as it was.

use crate::error::{CoreError, CoreResult};
use crate::node::{normalize_endpoint, Node};
use crate::types::now_millis;
use drawmirror_storage::{InMemoryBackend, SnapshotBackend};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    endpoint: String,
    #[serde(rename = "registeredAt")]
    registered_at: u64,
}

/// Entry of a seed file: `[{"name": "...", "url": "..."}]`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    /// Node name.
    pub name: String,
    /// Node endpoint.
    pub url: String,
}

/// The node registry.
///
/// # Thread Safety
///
/// Reads take a shared lock on the published map. Mutations are serialised
/// by the backend mutex and publish with a short exclusive lock.
pub struct NodeRegistry {
    nodes: RwLock<BTreeMap<String, Node>>,
    backend: Mutex<Box<dyn SnapshotBackend>>,
}

impl NodeRegistry {
    /// Opens a registry persisted in `backend`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegistry` if the stored JSON cannot be parsed, or a
    /// storage error if it cannot be read.
    pub fn open(backend: Box<dyn SnapshotBackend>) -> CoreResult<Self> {
        let nodes = match backend.load()? {
            Some(bytes) => parse(&bytes)?,
            None => BTreeMap::new(),
        };
        tracing::debug!(nodes = nodes.len(), "node registry loaded");
        Ok(Self {
            nodes: RwLock::new(nodes),
            backend: Mutex::new(backend),
        })
    }

    /// Creates an empty registry that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            backend: Mutex::new(Box::new(InMemoryBackend::new())),
        }
    }

    /// Registers a node.
    ///
    /// The endpoint is not contacted; reachability is only checked by a
    /// pull.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty name or endpoint
    /// - `DuplicateName` / `DuplicateEndpoint` if either is taken
    /// - a storage error if persisting fails (nothing is registered)
    pub fn add(&self, name: &str, endpoint: &str) -> CoreResult<Node> {
        let node = Node::new(name, endpoint, now_millis());
        validate(&node)?;

        let added = self.mutate(|nodes| {
            check_free(nodes, &node)?;
            nodes.insert(node.name.clone(), node.clone());
            Ok(node)
        })?;
        tracing::info!(name = %added.name, endpoint = %added.endpoint, "node registered");
        Ok(added)
    }

    /// Removes a node.
    ///
    /// # Errors
    ///
    /// `NotFound` if no node has this name, or a storage error.
    pub fn remove(&self, name: &str) -> CoreResult<Node> {
        let name = name.trim();
        let removed = self.mutate(|nodes| {
            nodes
                .remove(name)
                .ok_or_else(|| CoreError::node_not_found(name))
        })?;
        tracing::info!(name = %removed.name, "node removed");
        Ok(removed)
    }

    /// Looks up a node by name.
    ///
    /// # Errors
    ///
    /// `NotFound` if no node has this name.
    pub fn get(&self, name: &str) -> CoreResult<Node> {
        self.nodes
            .read()
            .get(name.trim())
            .cloned()
            .ok_or_else(|| CoreError::node_not_found(name.trim()))
    }

    /// All nodes, ordered by name.
    #[must_use]
    pub fn list(&self) -> Vec<Node> {
        self.nodes.read().values().cloned().collect()
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns true if no nodes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Adds nodes whose name and endpoint are both unknown.
    ///
    /// Existing entries are never removed or changed. Returns the names that
    /// were added; nothing is written if that list is empty.
    ///
    /// # Errors
    ///
    /// A storage error if persisting fails, in which case nothing is added.
    pub fn merge(&self, incoming: &[Node]) -> CoreResult<Vec<String>> {
        let added = self.mutate(|nodes| {
            let mut added = Vec::new();
            for node in incoming {
                let node = Node::new(&node.name, &node.endpoint, node.registered_at);
                if validate(&node).is_err() || check_free(nodes, &node).is_err() {
                    continue;
                }
                added.push(node.name.clone());
                nodes.insert(node.name.clone(), node);
            }
            Ok(added)
        })?;
        if !added.is_empty() {
            tracing::info!(added = ?added, "merged nodes from archive");
        }
        Ok(added)
    }

    /// Loads a seed file into an empty registry.
    ///
    /// Does nothing if any node is already registered. Invalid or
    /// conflicting entries are skipped with a warning. Returns the number of
    /// nodes added.
    ///
    /// # Errors
    ///
    /// I/O errors reading the file, `InvalidRegistry` if it is not a JSON
    /// array of `{name, url}`, or a storage error.
    pub fn seed_from_file(&self, path: impl AsRef<Path>) -> CoreResult<usize> {
        let path = path.as_ref();
        if !self.is_empty() {
            tracing::debug!(path = %path.display(), "registry not empty, seed skipped");
            return Ok(0);
        }
        let bytes = std::fs::read(path)?;
        let entries: Vec<SeedEntry> = serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::InvalidRegistry {
                message: format!("{}: {e}", path.display()),
            }
        })?;

        let now = now_millis();
        let count = self.mutate(|nodes| {
            if !nodes.is_empty() {
                return Ok(0);
            }
            let mut count = 0;
            for entry in &entries {
                let node = Node::new(&entry.name, &entry.url, now);
                if let Err(e) = validate(&node).and_then(|()| check_free(nodes, &node)) {
                    tracing::warn!(name = %entry.name, error = %e, "skipping seed entry");
                    continue;
                }
                nodes.insert(node.name.clone(), node);
                count += 1;
            }
            Ok(count)
        })?;
        tracing::info!(path = %path.display(), count, "registry seeded");
        Ok(count)
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Node>) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut backend = self.backend.lock();
        let mut next = self.nodes.read().clone();
        let result = f(&mut next)?;
        if *self.nodes.read() == next {
            return Ok(result);
        }

        let bytes = serialize(&next)?;
        if let Err(e) = backend.stage(&bytes).and_then(|()| backend.commit()) {
            tracing::warn!(error = %e, "registry persist failed, change discarded");
            if let Err(discard) = backend.discard() {
                tracing::warn!(error = %discard, "could not discard staged registry");
            }
            return Err(e.into());
        }

        *self.nodes.write() = next;
        Ok(result)
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.nodes.read().len())
            .finish_non_exhaustive()
    }
}

fn validate(node: &Node) -> CoreResult<()> {
    if node.name.is_empty() {
        return Err(CoreError::invalid_input("node name must not be empty"));
    }
    if node.endpoint.is_empty() {
        return Err(CoreError::invalid_input("node endpoint must not be empty"));
    }
    Ok(())
}

fn check_free(nodes: &BTreeMap<String, Node>, node: &Node) -> CoreResult<()> {
    if nodes.contains_key(&node.name) {
        return Err(CoreError::DuplicateName {
            name: node.name.clone(),
        });
    }
    let endpoint = normalize_endpoint(&node.endpoint);
    if let Some(existing) = nodes.values().find(|n| n.endpoint == endpoint) {
        return Err(CoreError::DuplicateEndpoint {
            endpoint,
            existing: existing.name.clone(),
        });
    }
    Ok(())
}

fn parse(bytes: &[u8]) -> CoreResult<BTreeMap<String, Node>> {
    let records: BTreeMap<String, NodeRecord> =
        serde_json::from_slice(bytes).map_err(|e| CoreError::InvalidRegistry {
            message: e.to_string(),
        })?;
    Ok(records
        .into_iter()
        .map(|(name, record)| {
            let node = Node {
                name: name.clone(),
                endpoint: record.endpoint,
                registered_at: record.registered_at,
            };
            (name, node)
        })
        .collect())
}

fn serialize(nodes: &BTreeMap<String, Node>) -> CoreResult<Vec<u8>> {
    let records: BTreeMap<&str, NodeRecord> = nodes
        .values()
        .map(|n| {
            (
                n.name.as_str(),
                NodeRecord {
                    endpoint: n.endpoint.clone(),
                    registered_at: n.registered_at,
                },
            )
        })
        .collect();
    serde_json::to_vec_pretty(&records).map_err(|e| CoreError::InvalidRegistry {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawmirror_storage::{FaultInjectingBackend, FileBackend};
    use tempfile::tempdir;

    #[test]
    fn add_get_list() {
        let registry = NodeRegistry::in_memory();
        let node = registry.add("mirror", "http://b:3002/").unwrap();
        assert_eq!(node.endpoint, "http://b:3002");

        assert_eq!(registry.get("mirror").unwrap(), node);
        registry.add("alpha", "http://a").unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["alpha", "mirror"]);
    }

    #[test]
    fn duplicate_name_rejected() {
        let registry = NodeRegistry::in_memory();
        registry.add("mirror", "http://b").unwrap();
        assert!(matches!(
            registry.add("mirror", "http://c"),
            Err(CoreError::DuplicateName { .. })
        ));
    }

    #[test]
    fn duplicate_endpoint_rejected_after_normalising() {
        let registry = NodeRegistry::in_memory();
        registry.add("one", "http://b").unwrap();
        assert!(matches!(
            registry.add("two", " http://b/ "),
            Err(CoreError::DuplicateEndpoint { existing, .. }) if existing == "one"
        ));
    }

    #[test]
    fn empty_fields_rejected() {
        let registry = NodeRegistry::in_memory();
        assert!(matches!(
            registry.add("  ", "http://b"),
            Err(CoreError::InvalidInput { .. })
        ));
        assert!(matches!(
            registry.add("x", " / "),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn remove_and_not_found() {
        let registry = NodeRegistry::in_memory();
        registry.add("mirror", "http://b").unwrap();
        registry.remove("mirror").unwrap();
        assert!(matches!(
            registry.get("mirror"),
            Err(CoreError::NotFound { kind: "node", .. })
        ));
        assert!(matches!(
            registry.remove("mirror"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path(), "nodes.json").unwrap();
            let registry = NodeRegistry::open(Box::new(backend)).unwrap();
            registry.add("mirror", "http://b").unwrap();
        }
        let raw = std::fs::read_to_string(dir.path().join("nodes.json")).unwrap();
        assert!(raw.contains("registeredAt"));

        let backend = FileBackend::open(dir.path(), "nodes.json").unwrap();
        let registry = NodeRegistry::open(Box::new(backend)).unwrap();
        assert_eq!(registry.get("mirror").unwrap().endpoint, "http://b");
    }

    #[test]
    fn failed_persist_leaves_registry_unchanged() {
        let backend = FaultInjectingBackend::new(InMemoryBackend::new());
        let plan = backend.plan_handle();
        let registry = NodeRegistry::open(Box::new(backend)).unwrap();
        registry.add("keep", "http://k").unwrap();

        plan.lock().fail_commit = true;
        assert!(matches!(
            registry.add("lost", "http://l"),
            Err(CoreError::Storage(_))
        ));
        assert!(registry.get("lost").is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn merge_is_additive() {
        let registry = NodeRegistry::in_memory();
        registry.add("local", "http://self").unwrap();
        registry.add("mirror", "http://b").unwrap();

        let incoming = vec![
            Node::new("mirror", "http://other", 1),
            Node::new("alias", "http://self", 1),
            Node::new("c", "http://c", 42),
        ];
        let added = registry.merge(&incoming).unwrap();

        assert_eq!(added, vec!["c"]);
        assert_eq!(registry.get("mirror").unwrap().endpoint, "http://b");
        assert_eq!(registry.get("c").unwrap().registered_at, 42);
        assert_eq!(registry.len(), 3);
        assert!(registry.merge(&incoming).unwrap().is_empty());
    }

    #[test]
    fn seed_only_into_empty_registry() {
        let dir = tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(
            &seed,
            r#"[{"name":"a","url":"http://a/"},{"name":"","url":"http://x"},{"name":"b","url":"http://a"}]"#,
        )
        .unwrap();

        let registry = NodeRegistry::in_memory();
        assert_eq!(registry.seed_from_file(&seed).unwrap(), 1);
        assert_eq!(registry.get("a").unwrap().endpoint, "http://a");

        assert_eq!(registry.seed_from_file(&seed).unwrap(), 0);
    }

    #[test]
    fn seed_rejects_malformed_file() {
        let dir = tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(&seed, "{not json").unwrap();
        let registry = NodeRegistry::in_memory();
        assert!(matches!(
            registry.seed_from_file(&seed),
            Err(CoreError::InvalidRegistry { .. })
        ));
    }
}
