//! CLI command implementations.

pub mod drawing;
pub mod inspect;
pub mod node;
pub mod pull;
pub mod serve;
pub mod transfer;

use drawmirror_core::{Config, Instance};
use std::path::Path;

/// Result type shared by all commands.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Opens the instance in `path`, creating the directory if needed.
pub fn open_instance(path: &Path) -> CommandResult<Instance> {
    open_instance_with(Config::new().data_dir(path))
}

/// Opens an instance from a full configuration.
pub fn open_instance_with(config: Config) -> CommandResult<Instance> {
    Instance::open(&config).map_err(|e| match &config.data_dir {
        Some(path) => format!("cannot open instance at {}: {e}", path.display()).into(),
        None => e.into(),
    })
}
