//! Serve command implementation.

use super::{open_instance_with, CommandResult};
use drawmirror_core::Config;
use drawmirror_sync_engine::{HttpClient, ReqwestClient};
use drawmirror_sync_server::{ExportConfig, ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Serves the instance at `path` until Ctrl-C.
pub fn run(path: &Path, bind: SocketAddr, seed: Option<&Path>, include_nodes: bool) -> CommandResult {
    let mut config = Config::new().data_dir(path);
    if let Some(seed) = seed {
        config = config.seed_file(seed);
    }
    let instance = Arc::new(open_instance_with(config)?);

    // Built before the runtime starts and dropped after it stops.
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);

    let server = SyncServer::new(
        ServerConfig::new(bind).with_export(ExportConfig::new().with_include_nodes(include_nodes)),
        Arc::clone(&instance),
        Arc::clone(&client),
    );

    println!(
        "Serving {} drawings and {} nodes from {} on http://{}",
        instance.store().len(),
        instance.registry().len(),
        path.display(),
        bind
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind).await?;
        server
            .serve_on(listener, async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
            })
            .await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;
    drop(runtime);
    drop(client);
    Ok(())
}
