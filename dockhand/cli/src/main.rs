//! dockhand - scaffold, build, deploy and health-check compose projects.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dockhand_core::{DeployConfig, Environment, OutputFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dockhand")]
#[command(about = "Compose deployment helper")]
#[command(version)]
struct Cli {
    /// Project root holding `docker/` and the build log
    #[arg(long, global = true, default_value = ".", env = "DOCKHAND_PROJECT_DIR")]
    project_dir: PathBuf,

    /// Configuration file (defaults to `<project-dir>/dockhand.yml` when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the compose file for an environment
    Init {
        #[arg(long, default_value = "development")]
        environment: Environment,

        /// Overwrite an existing compose file
        #[arg(long)]
        force: bool,
    },

    /// Validate, build, start and health-check an environment
    Deploy {
        #[arg(long, default_value = "development")]
        environment: String,

        /// Build detached, logging to docker-build.log; skips deploy and health checks
        #[arg(long)]
        background: bool,

        #[arg(long)]
        skip_deploy: bool,

        #[arg(long)]
        skip_health: bool,
    },

    /// Show build progress and container state
    Status {
        #[arg(long, default_value = "development")]
        environment: Environment,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Run all health probes
    Health {
        #[arg(long, default_value = "development")]
        environment: Environment,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Roll back a deployment (not implemented yet)
    Rollback {
        #[arg(long, default_value = "development")]
        environment: Environment,

        #[arg(long, default_value = "previous")]
        to: String,
    },

    /// Wait for the database, migrate and warm caches inside the app container
    ContainerStart {
        #[arg(long, env = "DOCKHAND_ENV", default_value = "development")]
        environment: Environment,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DeployConfig::load(&cli.project_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Init { environment, force } => commands::init::run(&config, environment, force),
        Commands::Deploy {
            environment,
            background,
            skip_deploy,
            skip_health,
        } => {
            commands::deploy::run(&config, &environment, background, skip_deploy, skip_health).await
        }
        Commands::Status {
            environment,
            format,
        } => commands::status::run(&config, environment, format).await,
        Commands::Health {
            environment,
            format,
        } => commands::health::run(&config, environment, format).await,
        Commands::Rollback { environment, to } => commands::rollback::run(environment, &to),
        Commands::ContainerStart { environment } => {
            commands::container_start::run(&config, environment).await
        }
    }
}
