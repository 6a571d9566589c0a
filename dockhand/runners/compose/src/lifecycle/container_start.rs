use std::time::Duration;

use dockhand_core::{
    CommandSpec, DeployConfig, Environment, ProcessRunner, adjust_timeout,
    constants::{DATABASE_WAIT_ATTEMPTS, DATABASE_WAIT_DELAY},
    health::ping_database,
    probe_with_observer,
};
use tracing::{info, warn};

use crate::errors::ContainerStartError;

/// What the start-up sequence did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StartSummary {
    pub database_attempts: u32,
    pub migrated: bool,
    pub warm_commands: usize,
}

/// Bootstraps the application inside its container: waits for the database,
/// migrates and, in production, runs the warm-up commands.
pub struct ContainerStarter<'a, R> {
    config: &'a DeployConfig,
    runner: R,
    wait_attempts: u32,
    wait_delay: Duration,
}

impl<'a, R> ContainerStarter<'a, R>
where
    R: ProcessRunner,
{
    pub const fn new(config: &'a DeployConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            wait_attempts: DATABASE_WAIT_ATTEMPTS,
            wait_delay: DATABASE_WAIT_DELAY,
        }
    }

    #[must_use]
    pub const fn with_database_wait(mut self, attempts: u32, delay: Duration) -> Self {
        self.wait_attempts = attempts;
        self.wait_delay = delay;
        self
    }

    pub async fn start(&self, environment: Environment) -> Result<StartSummary, ContainerStartError> {
        info!(environment = %environment, "starting application in container");

        let database_attempts = self.wait_for_database().await?;

        let migrated = match &self.config.migrate_command {
            Some(argv) => {
                info!("running database migrations");
                self.run_step(argv, environment).await?
            }
            None => {
                info!("no migration command configured; skipping migrations");
                false
            }
        };

        let mut warm_commands = 0;
        if environment.is_production() {
            info!(commands = self.config.warm_commands.len(), "optimizing for production");
            for argv in &self.config.warm_commands {
                if self.run_step(argv, environment).await? {
                    warm_commands += 1;
                }
            }
        }

        info!("application started successfully");
        Ok(StartSummary {
            database_attempts,
            migrated,
            warm_commands,
        })
    }

    async fn wait_for_database(&self) -> Result<u32, ContainerStartError> {
        let url = self
            .config
            .database_url
            .as_deref()
            .ok_or(ContainerStartError::MissingDatabaseUrl)?;

        info!(max_attempts = self.wait_attempts, "waiting for database connection");
        let outcome = probe_with_observer(
            "database",
            self.wait_attempts,
            self.wait_delay,
            || ping_database(url),
            |failed| {
                info!(
                    "Database not ready (attempt {}/{}), waiting...",
                    failed.attempt, failed.max_attempts
                );
            },
        )
        .await;

        if outcome.ready {
            info!(attempts = outcome.attempts, "database connected");
            Ok(outcome.attempts)
        } else {
            Err(ContainerStartError::DatabaseUnavailable {
                attempts: outcome.attempts,
            })
        }
    }

    /// Run one configured command; returns false when the command is empty.
    async fn run_step(
        &self,
        argv: &[String],
        environment: Environment,
    ) -> Result<bool, ContainerStartError> {
        let Some(spec) = CommandSpec::from_argv(argv) else {
            warn!("skipping empty command");
            return Ok(false);
        };
        let spec = spec
            .current_dir(&self.config.project_root)
            .timeout(adjust_timeout(
                self.config.settings(environment).deploy_timeout(),
            ));

        info!(command = %spec.display(), "running start-up command");
        let output = self.runner.run(&spec).await?;
        if !output.stdout.trim().is_empty() {
            info!(command = %spec.display(), output = %output.stdout.trim(), "start-up command output");
        }
        if output.success {
            Ok(true)
        } else {
            Err(ContainerStartError::CommandFailed {
                command: spec.display(),
                stderr: output.stderr,
            })
        }
    }
}
