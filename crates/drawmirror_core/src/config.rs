//! Instance configuration.

use std::path::PathBuf;

/// Configuration for opening an instance.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Data directory. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Seed file of `[{name, url}]` loaded into an empty registry.
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Creates an in-memory configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            create_if_missing: true,
            ..Self::default()
        }
    }

    /// Sets the data directory.
    #[must_use]
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the registry seed file.
    #[must_use]
    pub fn seed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_file = Some(path.into());
        self
    }
}
