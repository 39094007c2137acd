use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "fleetdeploy")]
#[command(version, about = "Drive fleet-management deployments to completion")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (defaults to ./fleetdeploy.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a deployment and monitor it until it finishes
    Deploy(DeployArgs),
    /// List deploy targets defined in the config file
    Targets,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args)]
pub struct DeployArgs {
    /// Named target from fleetdeploy.toml (optional when only one is defined)
    pub target: Option<String>,

    #[arg(long)]
    pub stack_id: Option<String>,

    #[arg(long)]
    pub app_id: Option<String>,

    /// Deployment command to execute (e.g. "deploy" or "setup")
    #[arg(long)]
    pub command: Option<String>,

    /// Control-plane region
    #[arg(long)]
    pub region: Option<String>,

    /// Control-plane endpoint override
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Seconds between status checks
    #[arg(long)]
    pub check_interval: Option<u64>,

    /// Report the outcome without failing when the deployment finishes unsuccessfully
    #[arg(long)]
    pub no_abort_on_failure: bool,

    /// Overall deadline in seconds for the whole run (off by default)
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration (secrets redacted)
    Show,
    /// Validate configuration and report any missing fields
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "fleetdeploy=debug"
    } else {
        "fleetdeploy=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Deploy(args) => cmd::cmd_deploy(&cli, args).await?,
        Commands::Targets => cmd::cmd_targets(&cli)?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.as_ref())?,
    }

    Ok(())
}
