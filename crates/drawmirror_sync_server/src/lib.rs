//! # Drawmirror Sync Server
//!
//! HTTP surface of a drawmirror instance.
//!
//! This crate provides:
//! - The export service behind `GET /export-data`
//! - Operator endpoints for the node registry and for pulls
//! - An axum router and server
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/export-data` | Archive of the local dataset |
//! | GET | `/nodes` | List registered nodes |
//! | POST | `/nodes` | Register a node (`{"name", "url"}`) |
//! | DELETE | `/nodes/{name}` | Remove a node |
//! | POST | `/pull/{name}` | Pull from a node and wait for the result |
//! | POST | `/start-pull/{name}` | Start a pull in the background |
//! | GET | `/pull-status` | State of the current or last pull |
//! | GET | `/health` | Liveness and counts |
//!
//! An instance can export while it is pulling. Exports read an immutable
//! snapshot and never take the pull guard or the store's writer lock.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod export;
mod handler;
mod router;
mod server;

pub use config::{ExportConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use export::{ExportResponse, ExportService};
pub use handler::{HandlerContext, RequestHandler, SharedOrchestrator};
pub use router::build_router;
pub use server::SyncServer;
