//! Registered peer instances.

use serde::{Deserialize, Serialize};

/// A peer instance this instance can pull from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique name chosen by the operator.
    pub name: String,
    /// Base URL, without trailing slash.
    pub endpoint: String,
    /// Registration time, Unix milliseconds.
    #[serde(rename = "registeredAt")]
    pub registered_at: u64,
}

impl Node {
    /// Creates a node, normalising name and endpoint.
    pub fn new(name: &str, endpoint: &str, registered_at: u64) -> Self {
        Self {
            name: name.trim().to_string(),
            endpoint: normalize_endpoint(endpoint),
            registered_at,
        }
    }

    /// Joins `path` onto the endpoint.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}/{}", self.endpoint, path)
        }
    }
}

/// Trims whitespace and trailing slashes from an endpoint.
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}
