//! Server configuration.

use drawmirror_sync_engine::PullConfig;
use std::net::SocketAddr;

/// What the export endpoint includes.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Whether the archive carries this instance's node registry.
    pub include_nodes: bool,
}

impl ExportConfig {
    /// Creates the default export configuration.
    pub fn new() -> Self {
        Self {
            include_nodes: true,
        }
    }

    /// Sets whether node entries are exported.
    pub fn with_include_nodes(mut self, include: bool) -> Self {
        self.include_nodes = include;
        self
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Export endpoint settings.
    pub export: ExportConfig,
    /// Settings for pulls triggered through the operator API.
    pub pull: PullConfig,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            export: ExportConfig::default(),
            pull: PullConfig::default(),
        }
    }

    /// Sets the export settings.
    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    /// Sets the pull settings.
    pub fn with_pull(mut self, pull: PullConfig) -> Self {
        self.pull = pull;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 3002)))
    }
}
