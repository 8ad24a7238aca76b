//! # Drawmirror Storage
//!
//! Snapshot storage backends for drawmirror.
//!
//! A backend holds exactly one durable snapshot: an opaque byte string that
//! the caller (the dataset store, the node registry) owns the format of.
//! Replacing it is a two-phase operation:
//!
//! 1. [`SnapshotBackend::stage`] writes the new bytes next to the current
//!    snapshot without touching it.
//! 2. [`SnapshotBackend::commit`] atomically makes the staged bytes current.
//!
//! A failed or abandoned stage is removed with [`SnapshotBackend::discard`]
//! and leaves the current snapshot exactly as it was. There is never an
//! instant where a reader of the backend sees a mix of old and new bytes.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral instances
//! - [`FileBackend`] - Write-temp, fsync, rename on a real file system
//! - [`FaultInjectingBackend`] - Wrapper that fails chosen steps on demand
//!
//! ## Example
//!
//! ```rust
//! use drawmirror_storage::{SnapshotBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.stage(b"v1").unwrap();
//! backend.commit().unwrap();
//! assert_eq!(backend.load().unwrap().as_deref(), Some(&b"v1"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod fault;
mod file;
mod memory;

pub use backend::SnapshotBackend;
pub use error::{StorageError, StorageResult};
pub use fault::{FaultInjectingBackend, FaultPlan};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
