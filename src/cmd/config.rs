//! `fleetdeploy config` — show or validate configuration without touching
//! the network.

use anyhow::Result;
use console::style;

use super::super::{Cli, ConfigCommands};
use fleetdeploy::config::{DeployToml, RawTarget};
use fleetdeploy::ui::icons::{CHECK, CROSS};

pub fn cmd_config(cli: &Cli, command: Option<&ConfigCommands>) -> Result<()> {
    match command.unwrap_or(&ConfigCommands::Show) {
        ConfigCommands::Show => show(cli),
        ConfigCommands::Validate => validate(cli),
    }
}

fn show(cli: &Cli) -> Result<()> {
    let toml = DeployToml::load_or_default(cli.config.as_deref())?;
    let mut redacted = toml.clone();

    let redact = |target: &mut RawTarget| {
        if let Some(creds) = &mut target.credentials
            && creds.secret_access_key.is_some()
        {
            creds.secret_access_key = Some("<redacted>".to_string());
        }
    };
    redact(&mut redacted.options);
    for target in redacted.targets.values_mut() {
        redact(target);
    }

    print!("{}", toml::to_string_pretty(&redacted)?);
    Ok(())
}

/// Resolve every target (and bare [options] when none exist) and report the
/// outcome. Exits non-zero when any target fails validation.
fn validate(cli: &Cli) -> Result<()> {
    let toml = DeployToml::load_or_default(cli.config.as_deref())?;
    let env = RawTarget::from_env();

    let names = toml.target_names();
    let mut failures = 0usize;

    if names.is_empty() {
        match toml.merged_target(None, &env)?.resolve() {
            Ok(_) => println!("{}options: valid", CHECK),
            Err(err) => {
                failures += 1;
                println!("{}options: {err}", CROSS);
            }
        }
    } else {
        for name in &names {
            match toml.merged_target(Some(name), &env)?.resolve() {
                Ok(_) => println!("{}{}: valid", CHECK, style(name).cyan()),
                Err(err) => {
                    failures += 1;
                    println!("{}{}: {err}", CROSS, style(name).cyan());
                }
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} target(s) failed validation");
    }
    Ok(())
}
