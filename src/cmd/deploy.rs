//! `fleetdeploy deploy` — start a deployment and monitor it to completion.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use super::super::{Cli, DeployArgs};
use fleetdeploy::client::HttpClient;
use fleetdeploy::config::{DeployToml, RawCredentials, RawTarget};
use fleetdeploy::orchestrator::DeploymentOrchestrator;
use fleetdeploy::ui::DeployUI;

/// Build the highest-precedence configuration layer from CLI flags.
fn overrides_from_flags(args: &DeployArgs) -> RawTarget {
    RawTarget {
        stack_id: args.stack_id.clone(),
        app_id: args.app_id.clone(),
        command: args.command.clone(),
        credentials: args.region.clone().map(|region| RawCredentials {
            region: Some(region),
            ..RawCredentials::default()
        }),
        endpoint: args.endpoint.clone(),
        check_interval_ms: args.check_interval.map(|secs| secs * 1_000),
        abort_on_failed_deployment: args.no_abort_on_failure.then_some(false),
        timeout_ms: args.timeout.map(|secs| secs * 1_000),
        ..RawTarget::default()
    }
}

pub async fn cmd_deploy(cli: &Cli, args: &DeployArgs) -> Result<()> {
    let toml = DeployToml::load_or_default(cli.config.as_deref())?;

    // An unnamed invocation falls back to the sole declared target, or to
    // bare [options] when none are declared.
    let target_name = match (&args.target, toml.target_names().len()) {
        (Some(name), _) => Some(name.clone()),
        (None, 1) => toml.target_names().pop(),
        (None, _) => None,
    };

    let base = toml.merged_target(target_name.as_deref(), &RawTarget::from_env())?;
    let merged = overrides_from_flags(args).merged_over(&base);

    // Validation runs before any network call.
    let resolved = merged.resolve()?;
    debug!(
        target = target_name.as_deref().unwrap_or("(options)"),
        stack = %resolved.request.stack_id,
        app = %resolved.request.app_id,
        "resolved deploy configuration"
    );

    let client = HttpClient::new(resolved.credentials.clone(), resolved.endpoint.clone());
    let orchestrator = DeploymentOrchestrator::new(client, resolved.orchestrator.clone())
        .with_reporter(Arc::new(DeployUI::new(cli.verbose)));

    // Ctrl-C abandons monitoring; the remote deployment keeps running.
    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    orchestrator.run(&resolved.request).await?;
    Ok(())
}
