//! Typed error hierarchy for fleetdeploy.
//!
//! Three levels cover the three failure classes:
//! - `ConfigError` — invalid or incomplete configuration, caught before any network call
//! - `TransportError` — control-plane request failures from either client operation
//! - `DeployError` — everything a deployment run can surface to its caller

use crate::client::{DeploymentId, DeploymentStatus};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors detected while loading, merging, or validating configuration.
///
/// These are precondition failures: always fatal to the run, never retried,
/// and raised before the orchestrator touches the network.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures from the control-plane client.
///
/// The orchestrator treats these as fatal and does not retry; retry policy,
/// if desired, belongs in a wrapper around the client implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Control-plane request failed during {operation}: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Control plane returned HTTP {status} during {operation}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Unexpected control-plane response during {operation}: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
}

/// Errors surfaced by a deployment run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Deployment {id} finished with status \"{}\"", status.state)]
    DeploymentFailed {
        id: DeploymentId,
        status: DeploymentStatus,
    },

    #[error("Deployment monitoring cancelled")]
    Cancelled,

    #[error("Deployment did not reach a terminal state within {}s", after.as_secs())]
    TimedOut { after: Duration },
}
