//! Control-plane client interface and the deployment data model.
//!
//! The orchestrator only ever talks to the control plane through the
//! [`DeploymentClient`] trait: two operations, start a deployment and fetch
//! the current status of one. Any concrete backend — the HTTP client in
//! [`http`], or a scripted double in tests — satisfies the same seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::TransportError;

pub mod http;

pub use http::HttpClient;

/// Opaque identifier the control plane assigns to a deployment.
///
/// Owned by the orchestrator for the lifetime of a single run; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(pub String);

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to deploy: a named command against an app on a stack.
///
/// Immutable once constructed; validation happens in the config layer before
/// one of these is ever built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRequest {
    pub stack_id: String,
    pub app_id: String,
    /// Command name understood by the control plane (e.g. "deploy" or "setup").
    pub command: String,
    /// Optional command arguments, keyed by argument name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, Vec<String>>>,
}

/// Remote state of a deployment as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Deployment is still in progress; keep polling.
    Running,
    /// Deployment finished and the control plane reports success.
    Successful,
    /// Deployment finished unsuccessfully.
    Failed,
    /// Any other terminal state the control plane may report.
    #[serde(untagged)]
    Other(String),
}

impl DeploymentState {
    /// Anything other than `Running` is terminal: no further polling occurs.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether this state counts as a successful outcome.
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Successful)
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Successful => f.write_str("successful"),
            Self::Failed => f.write_str("failed"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Point-in-time status of a deployment, fetched fresh on each poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub id: DeploymentId,
    pub state: DeploymentState,
    pub created_at: DateTime<Utc>,
    /// Absent while the deployment is still running.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Capability to start a deployment and observe its progress.
///
/// Implementations own their connection-level concurrency safety; the
/// orchestrator performs no locking around them.
#[async_trait]
pub trait DeploymentClient: Send + Sync {
    /// Start the deployment described by `request` and return its handle.
    async fn start_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentId, TransportError>;

    /// Fetch the current status of a previously started deployment.
    async fn fetch_status(&self, id: &DeploymentId) -> Result<DeploymentStatus, TransportError>;
}
