use std::{io, path::PathBuf};

use dockhand_core::ProcessError;

use crate::deployer::DeploymentStep;

#[derive(Debug, thiserror::Error)]
/// Failures that abort a deployment.
pub enum DeployError {
    #[error("Invalid environment: {value}\nAllowed environments: {allowed}")]
    InvalidEnvironment { value: String, allowed: String },
    #[error(
        "Docker compose file not found: {path}\nRun: dockhand init --environment={environment}",
        path = path.display()
    )]
    MissingConfiguration { path: PathBuf, environment: String },
    #[error("Docker build failed:\n{stderr}\nFull output:\n{stdout}")]
    BuildFailed { stdout: String, stderr: String },
    #[error("background build is not running (no process matches '{pattern}'); see {log}", log = log.display())]
    BuildNotRunning { pattern: String, log: PathBuf },
    #[error("Container deployment failed:\n{stderr}")]
    DeployFailed { stderr: String },
    #[error("health checks failed for: {}", failed.join(", "))]
    Unhealthy { failed: Vec<String> },
    #[error("{step} failed: {source}", step = step.label())]
    Command {
        step: DeploymentStep,
        #[source]
        source: ProcessError,
    },
}

#[derive(Debug, thiserror::Error)]
/// Failures while scaffolding compose files.
pub enum ScaffoldError {
    #[error("compose file already exists at {path}; pass --force to overwrite", path = path.display())]
    AlreadyExists { path: PathBuf },
    #[error("failed to render compose template: {source}")]
    Render {
        #[source]
        source: tera::Error,
    },
    #[error("failed to write compose file at {path}: {source}", path = path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
/// Failures while bootstrapping the application inside its container.
pub enum ContainerStartError {
    #[error("DATABASE_URL is not configured; cannot wait for the database")]
    MissingDatabaseUrl,
    #[error("Database connection failed after {attempts} attempts")]
    DatabaseUnavailable { attempts: u32 },
    #[error("{command} failed:\n{stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error(transparent)]
    Process(#[from] ProcessError),
}
