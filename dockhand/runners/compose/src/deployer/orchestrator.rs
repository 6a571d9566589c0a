use dockhand_core::{Environment, HealthReport, ProcessRunner, probe};
use tokio::{sync::Mutex, time::sleep};
use tracing::{info, warn};

use super::{
    BuildMode, Deployer, DeploymentReport, DeploymentState, DeploymentStep,
    setup::{validate_configuration, validate_environment},
};
use crate::{
    docker::commands::{ComposeCli, is_process_running},
    errors::DeployError,
};

/// Drives one deployment through its states, failing fast.
pub struct DeploymentOrchestrator<'d, 'a, R> {
    deployer: &'d Deployer<'a, R>,
}

impl<'d, 'a, R> DeploymentOrchestrator<'d, 'a, R>
where
    R: ProcessRunner,
{
    pub const fn new(deployer: &'d Deployer<'a, R>) -> Self {
        Self { deployer }
    }

    pub async fn run(&self, environment: &str) -> DeploymentReport {
        let mut report = DeploymentReport::new();
        match self.execute(environment, &mut report).await {
            Ok(()) => {
                report.enter(DeploymentState::Done);
                info!(environment, "deployment completed");
            }
            Err(error) => {
                warn!(environment, step = ?report.failed_at(), "deployment failed: {error}");
                report.set_error(error);
            }
        }
        report
    }

    async fn execute(&self, raw: &str, report: &mut DeploymentReport) -> Result<(), DeployError> {
        let options = self.deployer.options;

        report.enter(DeploymentState::ValidatingEnv);
        let environment = validate_environment(raw)
            .map_err(|err| report.failed(DeploymentStep::ValidateEnvironment, err))?;
        report.set_environment(environment);
        report.passed(
            DeploymentStep::ValidateEnvironment,
            format!("environment {environment}"),
        );

        report.enter(DeploymentState::ValidatingConfig);
        let compose_file = validate_configuration(self.deployer.config, environment)
            .map_err(|err| report.failed(DeploymentStep::ValidateConfiguration, err))?;
        report.passed(
            DeploymentStep::ValidateConfiguration,
            format!("found {}", compose_file.display()),
        );

        info!(
            environment = %environment,
            compose_file = %compose_file.display(),
            build = ?options.build,
            deploy = options.deploy,
            health_check = options.health_check,
            "deployment starting"
        );

        report.enter(DeploymentState::Building);
        let cli = ComposeCli::new(self.deployer.config, environment);
        let detail = match options.build {
            BuildMode::Foreground => self.build(&cli).await,
            BuildMode::Background => self.build_in_background(&cli).await,
        }
        .map_err(|err| report.failed(DeploymentStep::Build, err))?;
        report.passed(DeploymentStep::Build, detail);

        if options.build == BuildMode::Background {
            info!("background build started; skipping deploy and health checks");
            return Ok(());
        }

        if options.deploy {
            report.enter(DeploymentState::Deploying);
            let detail = self
                .bring_up(&cli, environment)
                .await
                .map_err(|err| report.failed(DeploymentStep::Deploy, err))?;
            report.passed(DeploymentStep::Deploy, detail);
        }

        if options.health_check {
            report.enter(DeploymentState::HealthChecking);
            let (healthy, health) = self.check_health(environment).await;
            let failed: Vec<String> = health
                .unhealthy()
                .map(|result| result.service().to_owned())
                .collect();
            report.set_health(health);
            if !healthy {
                return Err(report.failed(DeploymentStep::HealthCheck, DeployError::Unhealthy { failed }));
            }
            report.passed(DeploymentStep::HealthCheck, "all services healthy");
        }

        Ok(())
    }

    async fn build(&self, cli: &ComposeCli<'_>) -> Result<String, DeployError> {
        let spec = cli.build();
        info!(command = %spec.display(), timeout = ?spec.timeout_duration(), "building images");

        let output = self
            .deployer
            .runner
            .run(&spec)
            .await
            .map_err(|source| DeployError::Command {
                step: DeploymentStep::Build,
                source,
            })?;

        if output.success {
            Ok(String::from("build completed"))
        } else {
            Err(DeployError::BuildFailed {
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }

    async fn build_in_background(&self, cli: &ComposeCli<'_>) -> Result<String, DeployError> {
        let spec = cli.build();
        let log = self.deployer.config.build_log_path();
        let pid = self
            .deployer
            .runner
            .spawn_detached(&spec, &log)
            .await
            .map_err(|source| DeployError::Command {
                step: DeploymentStep::Build,
                source,
            })?;
        info!(pid, log = %log.display(), "background build spawned");

        sleep(self.deployer.background_grace).await;

        let pattern = &self.deployer.config.compose.process_pattern;
        if is_process_running(&self.deployer.runner, pattern).await {
            Ok(format!(
                "build running in background (pid {pid}); follow {}",
                log.display()
            ))
        } else {
            Err(DeployError::BuildNotRunning {
                pattern: pattern.clone(),
                log,
            })
        }
    }

    async fn bring_up(
        &self,
        cli: &ComposeCli<'_>,
        environment: Environment,
    ) -> Result<String, DeployError> {
        let spec = cli.up();
        info!(command = %spec.display(), timeout = ?spec.timeout_duration(), "starting containers");

        let output = self
            .deployer
            .runner
            .run(&spec)
            .await
            .map_err(|source| DeployError::Command {
                step: DeploymentStep::Deploy,
                source,
            })?;
        if !output.success {
            return Err(DeployError::DeployFailed {
                stderr: output.stderr,
            });
        }

        let settle = self
            .deployer
            .settle_time
            .unwrap_or_else(|| self.deployer.config.settings(environment).settle_time());
        info!(settle = ?settle, "containers started; waiting for them to settle");
        sleep(settle).await;

        Ok(String::from("containers started"))
    }

    /// Run the aggregator until healthy or retries are exhausted. Returns the
    /// verdict and the last report.
    async fn check_health(&self, environment: Environment) -> (bool, HealthReport) {
        let retries = self
            .deployer
            .config
            .settings(environment)
            .health_check_retries
            .max(1);
        let last = Mutex::new(None);

        let healthy = probe(
            "health checks",
            retries,
            self.deployer.health_retry_delay,
            || {
                let health = &self.deployer.health;
                let last = &last;
                async move {
                    let report = health.run().await;
                    let failed = report
                        .unhealthy()
                        .map(|result| result.service().to_owned())
                        .collect::<Vec<_>>();
                    *last.lock().await = Some(report);
                    if failed.is_empty() {
                        Ok(())
                    } else {
                        Err(format!("unhealthy: {}", failed.join(", ")))
                    }
                }
            },
        )
        .await;

        let report = last
            .into_inner()
            .unwrap_or_else(|| HealthReport::new(Vec::new()));
        (healthy, report)
    }
}
