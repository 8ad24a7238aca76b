//! # Drawmirror Sync Engine
//!
//! Pulls a peer's full dataset and makes it the local one.
//!
//! This crate provides:
//! - The pull orchestrator (lookup, fetch, validate, replace)
//! - Cancellation before the commit point
//! - Pull status and counters for operators
//! - An HTTP client abstraction with a blocking `reqwest` implementation
//!   and an in-process loopback for tests
//!
//! ## Failure model
//!
//! A pull either replaces the whole local dataset or leaves it exactly as
//! it was. Network errors, remote errors and invalid archives are all
//! detected before the replace begins. Pulls are never retried
//! automatically; the operator decides when to try again.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod orchestrator;

pub use config::PullConfig;
pub use error::PullError;
pub use http::{
    HttpClient, HttpResponse, LoopbackClient, LoopbackServer, OfflineClient, ReqwestClient,
};
pub use orchestrator::{CancelToken, PullOrchestrator, PullResult, PullStats};
