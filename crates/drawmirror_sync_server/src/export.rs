//! The export service.
//!
//! An export captures the dataset as it is at the instant the request
//! arrives. The snapshot is an `Arc` clone taken under the store's read
//! lock; encoding and transfer happen after the lock is released, so a
//! slow download never holds up local writers or a concurrent pull.

use crate::config::ExportConfig;
use drawmirror_core::{Archive, CoreResult, Dataset, DatasetStore, Node, NodeRegistry};
use drawmirror_sync_engine::{HttpResponse, LoopbackServer};
use drawmirror_sync_protocol::{ExportManifest, ARCHIVE_CONTENT_TYPE, EXPORT_PATH};
use std::sync::Arc;

/// An encoded export, ready to send.
#[derive(Debug, Clone)]
pub struct ExportResponse {
    /// HTTP status.
    pub status: u16,
    /// Content type of `body`.
    pub content_type: &'static str,
    /// Manifest headers.
    pub headers: Vec<(&'static str, String)>,
    /// The archive.
    pub body: Vec<u8>,
}

impl ExportResponse {
    /// Converts into the engine's response type.
    pub fn into_http_response(self) -> HttpResponse {
        let mut response =
            HttpResponse::new(self.status, self.body).with_header("content-type", self.content_type);
        for (name, value) in self.headers {
            response = response.with_header(name, value);
        }
        response
    }
}

/// Serves archives of the local dataset.
#[derive(Debug, Clone)]
pub struct ExportService {
    store: Arc<DatasetStore>,
    registry: Arc<NodeRegistry>,
    config: ExportConfig,
}

impl ExportService {
    /// Creates an export service over a store and registry.
    pub fn new(store: Arc<DatasetStore>, registry: Arc<NodeRegistry>, config: ExportConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Captures the dataset and registry as they are now.
    pub fn snapshot(&self) -> (Arc<Dataset>, Vec<Node>) {
        let dataset = self.store.snapshot();
        let nodes = if self.config.include_nodes {
            self.registry.list()
        } else {
            Vec::new()
        };
        (dataset, nodes)
    }

    /// Encodes the current dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be encoded, which only happens
    /// if a stored attribute bag holds a non-finite float.
    pub fn export(&self) -> CoreResult<ExportResponse> {
        let (dataset, nodes) = self.snapshot();
        let body = Archive::from_dataset(&dataset, &nodes).encode()?;
        let manifest = drawmirror_core::read_manifest(&body)?;

        tracing::info!(
            records = manifest.record_count,
            nodes = manifest.node_count,
            bytes = body.len(),
            generation = dataset.generation(),
            "export assembled"
        );

        Ok(ExportResponse {
            status: 200,
            content_type: ARCHIVE_CONTENT_TYPE,
            headers: ExportManifest::from(&manifest).to_headers(),
            body,
        })
    }
}

impl LoopbackServer for ExportService {
    fn handle_get(&self, path: &str) -> HttpResponse {
        if path != EXPORT_PATH {
            return HttpResponse::new(404, format!("no route for {path}").into_bytes());
        }
        match self.export() {
            Ok(response) => response.into_http_response(),
            Err(e) => HttpResponse::new(500, e.to_string().into_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawmirror_core::verify;
    use drawmirror_sync_protocol::HEADER_RECORD_COUNT;

    fn service(include_nodes: bool) -> ExportService {
        let store = Arc::new(DatasetStore::in_memory());
        let registry = Arc::new(NodeRegistry::in_memory());
        store.create("one").unwrap();
        store.create("two").unwrap();
        registry.add("mirror", "http://b:3002").unwrap();
        ExportService::new(
            store,
            registry,
            ExportConfig::new().with_include_nodes(include_nodes),
        )
    }

    #[test]
    fn export_is_a_valid_archive() {
        let response = service(true).export().unwrap();
        let manifest = verify(&response.body).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, ARCHIVE_CONTENT_TYPE);
        assert_eq!(manifest.record_count, 2);
        assert_eq!(manifest.node_count, 1);
        assert!(response
            .headers
            .iter()
            .any(|(name, value)| *name == HEADER_RECORD_COUNT && value == "2"));
    }

    #[test]
    fn nodes_can_be_left_out() {
        let response = service(false).export().unwrap();
        assert_eq!(verify(&response.body).unwrap().node_count, 0);
    }

    #[test]
    fn unchanged_dataset_exports_identical_bytes() {
        let service = service(true);
        let first = service.export().unwrap().body;
        let second = service.export().unwrap().body;
        assert_eq!(first, second);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_writes() {
        let service = service(true);
        let (before, _) = service.snapshot();
        service.store.create("three").unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(service.snapshot().0.len(), 3);
    }

    #[test]
    fn loopback_serves_only_the_export_path() {
        let service = service(true);
        assert_eq!(service.handle_get(EXPORT_PATH).status, 200);
        assert_eq!(service.handle_get("/elsewhere").status, 404);
    }
}
