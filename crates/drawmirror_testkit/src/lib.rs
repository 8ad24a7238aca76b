//! # Drawmirror Testkit
//!
//! Test utilities shared by the drawmirror crates.
//!
//! This crate provides:
//! - Instance fixtures (in-memory and on-disk) with pre-populated datasets
//! - Sample drawings, nodes and encoded archives
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use drawmirror_testkit::prelude::*;
//!
//! #[test]
//! fn pull_replaces_everything() {
//!     let local = TestInstance::populated(3);
//!     let remote = sample_archive_bytes(5);
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
