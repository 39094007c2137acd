//! Deployment orchestration: initiate, poll until terminal, report.

pub mod runner;

pub use runner::{DeploymentOrchestrator, DeploymentResult};
