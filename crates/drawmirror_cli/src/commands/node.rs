//! Node registry commands.

use super::{open_instance, CommandResult};
use std::path::Path;

/// Registers a node.
pub fn add(path: &Path, name: &str, url: &str) -> CommandResult {
    let instance = open_instance(path)?;
    let node = instance.registry().add(name, url)?;
    println!("Registered {} at {}", node.name, node.endpoint);
    Ok(())
}

/// Removes a node.
pub fn remove(path: &Path, name: &str) -> CommandResult {
    let instance = open_instance(path)?;
    let node = instance.registry().remove(name)?;
    println!("Removed {} ({})", node.name, node.endpoint);
    Ok(())
}

/// Lists registered nodes.
pub fn list(path: &Path, format: &str) -> CommandResult {
    let instance = open_instance(path)?;
    let nodes = instance.registry().list();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
        _ => {
            if nodes.is_empty() {
                println!("No nodes registered");
            }
            for node in &nodes {
                println!("{:<20} {}", node.name, node.endpoint);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_list_remove() {
        let dir = TempDir::new().unwrap();
        add(dir.path(), "mirror", "http://b:3002").unwrap();
        list(dir.path(), "json").unwrap();

        assert!(add(dir.path(), "mirror", "http://c:3002").is_err());

        remove(dir.path(), "mirror").unwrap();
        assert!(remove(dir.path(), "mirror").is_err());
    }
}
