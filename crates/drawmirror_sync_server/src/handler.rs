//! Request handlers for the export and operator endpoints.
//!
//! Handlers are synchronous. The router runs them on tokio's blocking pool
//! because exports encode the whole dataset and pulls wait on the network
//! and the disk.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::export::{ExportResponse, ExportService};
use drawmirror_core::{Instance, Node};
use drawmirror_sync_engine::{HttpClient, PullOrchestrator};
use drawmirror_sync_protocol::{AddNodeRequest, HealthBody, NodeList, PullReport, PullStatus};
use std::sync::Arc;

/// The orchestrator type the server drives.
pub type SharedOrchestrator = PullOrchestrator<Arc<dyn HttpClient>>;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// The instance being served. Holds the data directory lock.
    pub instance: Arc<Instance>,
    /// Export service over the instance.
    pub export: ExportService,
    /// Pull orchestrator over the instance.
    pub orchestrator: Arc<SharedOrchestrator>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, instance: Arc<Instance>, client: Arc<dyn HttpClient>) -> Self {
        let export = ExportService::new(
            Arc::clone(instance.store()),
            Arc::clone(instance.registry()),
            config.export.clone(),
        );
        let orchestrator = Arc::new(PullOrchestrator::new(
            config.pull.clone(),
            client,
            instance.replace_engine(),
        ));
        Self {
            config,
            instance,
            export,
            orchestrator,
        }
    }
}

/// Handler for export and operator requests.
#[derive(Clone)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// The shared context.
    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    /// Handles `GET /export-data`.
    pub fn handle_export(&self) -> ServerResult<ExportResponse> {
        Ok(self.context.export.export()?)
    }

    /// Handles `GET /nodes`.
    pub fn handle_list_nodes(&self) -> NodeList {
        NodeList {
            nodes: self.context.instance.registry().list(),
        }
    }

    /// Handles `POST /nodes`.
    pub fn handle_add_node(&self, request: AddNodeRequest) -> ServerResult<Node> {
        Ok(self
            .context
            .instance
            .registry()
            .add(&request.name, &request.url)?)
    }

    /// Handles `DELETE /nodes/{name}`.
    pub fn handle_remove_node(&self, name: &str) -> ServerResult<Node> {
        Ok(self.context.instance.registry().remove(name)?)
    }

    /// Handles `POST /pull/{name}`: pulls and waits for the result.
    pub fn handle_pull(&self, name: &str) -> ServerResult<PullReport> {
        let result = self.context.orchestrator.pull(name)?;
        if let Some(error) = &result.registry_error {
            tracing::warn!(node = name, error = %error, "pull applied without registry merge");
        }
        Ok(result.to_report())
    }

    /// Handles `POST /start-pull/{name}`: starts a pull in the background.
    pub fn handle_start_pull(&self, name: &str) -> ServerResult<PullStatus> {
        self.context.orchestrator.start_pull(name)?;
        Ok(self.context.orchestrator.status())
    }

    /// Handles `GET /pull-status`.
    pub fn handle_pull_status(&self) -> PullStatus {
        self.context.orchestrator.status()
    }

    /// Handles `GET /health`.
    pub fn handle_health(&self) -> HealthBody {
        HealthBody {
            status: "ok".to_string(),
            drawings: self.context.instance.store().len(),
            nodes: self.context.instance.registry().len(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
