//! Operator-facing JSON messages.

use drawmirror_core::Node;
use serde::{Deserialize, Serialize};

/// Body of `POST /nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddNodeRequest {
    /// Node name.
    pub name: String,
    /// Base URL of the node.
    pub url: String,
}

/// Body of `GET /nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeList {
    /// Registered nodes ordered by name.
    pub nodes: Vec<Node>,
}

/// Phase of the most recent pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullState {
    /// No pull has run since start.
    Idle,
    /// A pull is running.
    Running,
    /// The last pull replaced the dataset.
    Succeeded,
    /// The last pull failed.
    Failed,
}

impl PullState {
    /// Returns true while a pull is running.
    pub fn is_active(&self) -> bool {
        matches!(self, PullState::Running)
    }
}

/// Observable status of the pull machinery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullStatus {
    /// Current phase.
    pub state: PullState,
    /// Human-readable detail.
    pub message: String,
    /// Node of the running or last pull.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Drawings applied by the last successful pull.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    /// Last change, Unix milliseconds.
    pub updated_at: u64,
}

impl Default for PullStatus {
    fn default() -> Self {
        Self {
            state: PullState::Idle,
            message: "no pull has run".to_string(),
            node: None,
            record_count: None,
            updated_at: 0,
        }
    }
}

/// Result of a completed pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullReport {
    /// Node the data came from.
    pub source_node: String,
    /// Drawings now held locally.
    pub record_count: usize,
    /// Drawings held before the pull.
    pub previous_count: usize,
    /// Nodes learned from the archive.
    #[serde(default)]
    pub nodes_added: Vec<String>,
    /// Hex SHA-256 of the applied archive.
    pub checksum: String,
}

/// Body of every failed operator request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind, e.g. `unknown_node`.
    pub kind: String,
    /// Human-readable message.
    pub error: String,
    /// Whether the operation left local state untouched.
    pub safe_to_retry: bool,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    /// Always `"ok"` when the server answers.
    pub status: String,
    /// Drawings currently held.
    pub drawings: usize,
    /// Nodes currently registered.
    pub nodes: usize,
    /// Server version.
    pub version: String,
}
