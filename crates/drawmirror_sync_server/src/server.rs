//! The HTTP server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::router::build_router;
use drawmirror_core::Instance;
use drawmirror_sync_engine::HttpClient;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves one instance's export endpoint and operator API.
///
/// # Example
///
/// ```no_run
/// use drawmirror_core::Instance;
/// use drawmirror_sync_engine::{HttpClient, ReqwestClient};
/// use drawmirror_sync_server::{ServerConfig, SyncServer};
/// use std::sync::Arc;
///
/// // The blocking client must be built outside the async runtime.
/// let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new().unwrap());
/// let server = SyncServer::new(ServerConfig::default(), Arc::new(Instance::in_memory()), client);
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// runtime.block_on(server.serve()).unwrap();
/// ```
pub struct SyncServer {
    config: ServerConfig,
    handler: RequestHandler,
}

impl SyncServer {
    /// Creates a server for `instance`, pulling through `client`.
    pub fn new(config: ServerConfig, instance: Arc<Instance>, client: Arc<dyn HttpClient>) -> Self {
        let context = Arc::new(HandlerContext::new(config.clone(), instance, client));
        Self {
            config,
            handler: RequestHandler::new(context),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The request handler (useful for testing).
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.handler.clone())
    }

    /// Binds the configured address and serves until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, std::future::pending()).await
    }

    /// Serves on an already bound listener until `shutdown` completes.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ServerResult<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            %addr,
            drawings = self.handler.handle_health().drawings,
            "server listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!(%addr, "server stopped");
        Ok(())
    }
}
