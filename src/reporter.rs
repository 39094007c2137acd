//! Progress event seam between the orchestrator and whatever displays it.
//!
//! The orchestrator emits [`DeploymentEvent`]s through a [`Reporter`]; the CLI
//! plugs in the terminal UI, tests plug in a recorder. Events are always
//! delivered before the corresponding error (if any) is returned to the
//! caller, preserving log-then-fail ordering.

use std::time::Duration;

use crate::client::{DeploymentId, DeploymentStatus};
use crate::orchestrator::DeploymentResult;

/// Structured progress and result events for one deployment run.
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// The control plane accepted the deployment and returned its handle.
    Initiated {
        id: DeploymentId,
        check_interval: Duration,
    },
    /// A poll came back with the deployment still in progress.
    StillRunning { id: DeploymentId },
    /// The deployment reached a successful terminal state.
    Completed { result: DeploymentResult },
    /// The deployment reached a non-successful terminal state.
    Failed {
        id: DeploymentId,
        status: DeploymentStatus,
    },
}

/// Receives progress and result events for display.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &DeploymentEvent);
}

/// Reporter that discards everything. Default when no UI is attached.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: &DeploymentEvent) {}
}
