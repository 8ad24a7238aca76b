//! # Drawmirror Core
//!
//! Local state of a drawmirror instance and the operations that replace it.
//!
//! This crate provides:
//! - The drawing and dataset model ([`Drawing`], [`Dataset`])
//! - The portable archive format ([`Archive`], [`ArchiveManifest`])
//! - The durable node registry ([`NodeRegistry`])
//! - The dataset store with copy-on-write writes ([`DatasetStore`])
//! - Atomic whole-dataset replacement ([`ReplaceEngine`])
//! - Data directory ownership ([`DataDir`], [`Instance`])
//!
//! ## Example
//!
//! ```
//! use drawmirror_core::{Archive, Instance};
//!
//! let source = Instance::in_memory();
//! source.store().create("floor plan").unwrap();
//! let bytes = Archive::from_dataset(&source.store().snapshot(), &[]).encode().unwrap();
//!
//! let target = Instance::in_memory();
//! let outcome = target.replace_engine().replace(Archive::decode(&bytes).unwrap()).unwrap();
//! assert_eq!(outcome.record_count, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
mod config;
mod dataset;
mod dir;
mod drawing;
mod error;
mod instance;
mod node;
mod registry;
mod replace;
mod store;
mod types;

pub use archive::{
    read_manifest, verify, Archive, ArchiveManifest, ARCHIVE_VERSION, MAX_ATTRIBUTE_DEPTH,
};
pub use config::Config;
pub use dataset::Dataset;
pub use dir::{DataDir, DATASET_FILE, REGISTRY_FILE};
pub use drawing::{Drawing, DEFAULT_DIRECTORY, DEFAULT_NAME, SAVE_KEYS};
pub use error::{CoreError, CoreResult};
pub use instance::Instance;
pub use node::{normalize_endpoint, Node};
pub use registry::{NodeRegistry, SeedEntry};
pub use replace::{ReplaceEngine, ReplaceOutcome};
pub use store::DatasetStore;
pub use types::{now_millis, DrawingId};

pub use drawmirror_codec::Value;
