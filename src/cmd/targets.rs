//! `fleetdeploy targets` — list deploy targets from the config file.

use anyhow::Result;
use console::style;

use super::super::Cli;
use fleetdeploy::config::DeployToml;

pub fn cmd_targets(cli: &Cli) -> Result<()> {
    let toml = DeployToml::load_or_default(cli.config.as_deref())?;

    if toml.targets.is_empty() {
        println!("No targets defined. Add [targets.<name>] tables to fleetdeploy.toml.");
        return Ok(());
    }

    for (name, target) in &toml.targets {
        let command = target
            .command
            .as_deref()
            .or(toml.options.command.as_deref())
            .unwrap_or("-");
        let stack = target.stack_id.as_deref().unwrap_or("-");
        let app = target.app_id.as_deref().unwrap_or("-");
        println!(
            "{}  command={command}  stack={stack}  app={app}",
            style(name).cyan().bold()
        );
    }

    Ok(())
}
