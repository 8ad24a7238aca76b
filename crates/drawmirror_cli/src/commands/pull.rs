//! Pull command implementation.

use super::{open_instance, CommandResult};
use drawmirror_sync_engine::{PullConfig, PullOrchestrator, ReqwestClient};
use std::path::Path;
use std::time::Duration;

/// Pulls from `name` into the instance at `path`.
pub fn run(path: &Path, name: &str, timeout_secs: u64) -> CommandResult {
    let instance = open_instance(path)?;
    let node = instance.registry().get(name)?;
    println!("Pulling from {} ({})...", node.name, node.endpoint);

    let orchestrator = PullOrchestrator::new(
        PullConfig::new().with_timeout(Duration::from_secs(timeout_secs)),
        ReqwestClient::new()?,
        instance.replace_engine(),
    );

    match orchestrator.pull(name) {
        Ok(result) => {
            println!(
                "Pulled {} drawings from {} (replaced {}) in {:.2?}",
                result.record_count, result.source_node, result.previous_count, result.duration
            );
            if !result.nodes_added.is_empty() {
                println!("Learned nodes: {}", result.nodes_added.join(", "));
            }
            if let Some(error) = result.registry_error {
                println!("Warning: nodes from the archive were not saved: {error}");
            }
            println!("Checksum: {}", result.checksum);
            Ok(())
        }
        Err(e) => {
            if e.is_safe_to_retry() {
                println!("Pull failed; local data is unchanged.");
            } else {
                println!("Pull failed and local data could not be restored. Verify the data directory.");
            }
            Err(e.into())
        }
    }
}
