use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dockhand_core::{
    CommandOutput, CommandSpec, DeployConfig, HealthAggregator, HealthCheckResult, HealthProbe,
    OutputFormat, ProcessError, ProcessRunner, render,
};
use dockhand_runner_compose::{
    BuildMode, DeployError, DeployOptions, Deployer, DeploymentState, DeploymentStep,
};

/// Answers compose subcommands from a script and records every call.
#[derive(Default)]
struct ScriptedRunner {
    build: Option<CommandOutput>,
    up: Option<CommandOutput>,
    up_times_out: bool,
    build_process_listed: bool,
    calls: Mutex<Vec<String>>,
    detached: Mutex<Vec<(String, PathBuf)>>,
}

impl ScriptedRunner {
    fn succeeding() -> Self {
        Self {
            build: Some(CommandOutput::ok("built\n")),
            up: Some(CommandOutput::ok("started\n")),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn spawned(&self) -> usize {
        self.detached.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(spec.display());
        let args = spec.arguments();
        if spec.program() == "pgrep" {
            return Ok(if self.build_process_listed {
                CommandOutput::ok("4242\n")
            } else {
                CommandOutput::failed(1, "")
            });
        }
        if args.iter().any(|arg| arg == "build") {
            return Ok(self.build.clone().unwrap_or_default());
        }
        if args.iter().any(|arg| arg == "up") {
            if self.up_times_out {
                return Err(ProcessError::Timeout {
                    command: spec.display(),
                    timeout: spec.timeout_duration(),
                });
            }
            return Ok(self.up.clone().unwrap_or_default());
        }
        Ok(CommandOutput::failed(127, "unexpected command"))
    }

    async fn spawn_detached(&self, spec: &CommandSpec, log_path: &Path) -> Result<u32, ProcessError> {
        self.detached
            .lock()
            .unwrap()
            .push((spec.display(), log_path.to_path_buf()));
        Ok(4242)
    }
}

struct StubProbe {
    service: &'static str,
    healthy: bool,
    runs: AtomicU32,
}

impl StubProbe {
    fn boxed(service: &'static str, healthy: bool) -> Box<dyn HealthProbe> {
        Box::new(Self {
            service,
            healthy,
            runs: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl HealthProbe for StubProbe {
    fn service(&self) -> &str {
        self.service
    }

    async fn check(&self) -> anyhow::Result<HealthCheckResult> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(if self.healthy {
            HealthCheckResult::healthy(self.service, format!("{} OK", self.service))
        } else {
            HealthCheckResult::unhealthy(self.service, format!("{} connection failed", self.service))
                .with_detail("error", "connection refused")
        })
    }
}

fn aggregator(database_healthy: bool) -> HealthAggregator {
    HealthAggregator::new(vec![
        StubProbe::boxed("Application", true),
        StubProbe::boxed("Database", database_healthy),
        StubProbe::boxed("Cache", true),
        StubProbe::boxed("Storage", true),
        StubProbe::boxed("Container", true),
    ])
}

fn project(environments: &[&str]) -> (tempfile::TempDir, DeployConfig) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("docker")).unwrap();
    for environment in environments {
        fs::write(
            dir.path()
                .join(format!("docker/docker-compose.{environment}.yml")),
            "services: {}\n",
        )
        .unwrap();
    }
    let config = DeployConfig {
        project_root: dir.path().to_path_buf(),
        ..DeployConfig::default()
    };
    (dir, config)
}

fn deployer<'a>(
    config: &'a DeployConfig,
    runner: &'a ScriptedRunner,
    database_healthy: bool,
) -> Deployer<'a, &'a ScriptedRunner> {
    Deployer::new(config, runner)
        .with_health(aggregator(database_healthy))
        .with_settle_time(Duration::ZERO)
        .with_health_retry_delay(Duration::ZERO)
        .with_background_grace(Duration::ZERO)
}

#[tokio::test]
async fn development_deploy_reaches_done() {
    let (_dir, config) = project(&["development"]);
    let runner = ScriptedRunner::succeeding();

    let report = deployer(&config, &runner, true).deploy("development").await;

    assert!(report.succeeded(), "unexpected error: {:?}", report.error());
    assert_eq!(
        report.states(),
        &[
            DeploymentState::Idle,
            DeploymentState::ValidatingEnv,
            DeploymentState::ValidatingConfig,
            DeploymentState::Building,
            DeploymentState::Deploying,
            DeploymentState::HealthChecking,
            DeploymentState::Done,
        ]
    );
    assert_eq!(
        runner.calls(),
        vec![
            String::from("docker compose -f docker/docker-compose.development.yml build --no-cache"),
            String::from(
                "docker compose -f docker/docker-compose.development.yml up -d --remove-orphans"
            ),
        ]
    );
    assert_eq!(report.steps().len(), 5);
    assert!(report.steps().iter().all(|step| step.success));
    assert!(report.health().unwrap().is_healthy());
}

#[tokio::test]
async fn missing_configuration_fails_before_any_subprocess() {
    let (_dir, config) = project(&["development"]);
    let runner = ScriptedRunner::succeeding();

    let report = deployer(&config, &runner, true).deploy("staging").await;

    assert_eq!(report.state(), DeploymentState::Failed);
    assert_eq!(
        report.failed_at(),
        Some(DeploymentStep::ValidateConfiguration)
    );
    assert_eq!(
        report.states().last().copied(),
        Some(DeploymentState::Failed)
    );
    assert!(report.states().contains(&DeploymentState::ValidatingConfig));
    assert!(runner.calls().is_empty());
    assert_eq!(runner.spawned(), 0);

    let message = report.error().unwrap().to_string();
    assert!(message.contains("docker/docker-compose.staging.yml"));
    assert!(message.contains("dockhand init --environment=staging"));
}

#[tokio::test]
async fn invalid_environment_fails_at_validation() {
    let (_dir, config) = project(&["development", "staging", "production"]);
    let runner = ScriptedRunner::succeeding();

    let result = deployer(&config, &runner, true)
        .deploy_checked("qa")
        .await;

    match result {
        Err(DeployError::InvalidEnvironment { value, allowed }) => {
            assert_eq!(value, "qa");
            assert_eq!(allowed, "development, staging, production");
        }
        other => panic!("expected invalid environment, got {other:?}"),
    }
    assert!(runner.calls().is_empty());
    assert_eq!(runner.spawned(), 0);
}

#[tokio::test]
async fn unhealthy_database_fails_health_step() {
    let (_dir, config) = project(&["development"]);
    let runner = ScriptedRunner::succeeding();

    let report = deployer(&config, &runner, false).deploy("development").await;

    assert_eq!(report.state(), DeploymentState::Failed);
    assert_eq!(report.failed_at(), Some(DeploymentStep::HealthCheck));
    match report.error() {
        Some(DeployError::Unhealthy { failed }) => assert_eq!(failed, &["Database"]),
        other => panic!("expected unhealthy error, got {other:?}"),
    }

    let health = report.health().unwrap();
    assert!(!health.is_healthy());
    let json: serde_json::Value =
        serde_json::from_str(&render::health(health, OutputFormat::Json).unwrap()).unwrap();
    let unhealthy: Vec<&String> = json
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, result)| result["status"] == "unhealthy")
        .map(|(service, _)| service)
        .collect();
    assert_eq!(unhealthy, vec!["Database"]);
}

#[tokio::test]
async fn health_checks_are_retried_per_environment() {
    let (_dir, config) = project(&["production"]);
    let runner = ScriptedRunner::succeeding();
    let probe = std::sync::Arc::new(AtomicU32::new(0));

    struct CountingProbe(std::sync::Arc<AtomicU32>);

    #[async_trait]
    impl HealthProbe for CountingProbe {
        fn service(&self) -> &str {
            "Application"
        }

        async fn check(&self) -> anyhow::Result<HealthCheckResult> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        }
    }

    let report = Deployer::new(&config, &runner)
        .with_health(HealthAggregator::new(vec![Box::new(CountingProbe(
            probe.clone(),
        ))]))
        .with_settle_time(Duration::ZERO)
        .with_health_retry_delay(Duration::ZERO)
        .deploy("production")
        .await;

    assert_eq!(report.failed_at(), Some(DeploymentStep::HealthCheck));
    assert_eq!(
        probe.load(Ordering::SeqCst),
        config.environments.production.health_check_retries
    );
}

#[tokio::test]
async fn failed_build_surfaces_output_and_skips_deploy() {
    let (_dir, config) = project(&["development"]);
    let runner = ScriptedRunner {
        build: Some(CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::from("Step 3/9 : RUN composer install"),
            stderr: String::from("failed to solve: exit code 2"),
        }),
        ..ScriptedRunner::succeeding()
    };

    let report = deployer(&config, &runner, true).deploy("development").await;

    assert_eq!(report.failed_at(), Some(DeploymentStep::Build));
    let message = report.error().unwrap().to_string();
    assert!(message.contains("failed to solve: exit code 2"));
    assert!(message.contains("Step 3/9"));
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn deploy_timeout_is_reported_as_command_failure() {
    let (_dir, config) = project(&["staging"]);
    let runner = ScriptedRunner {
        up_times_out: true,
        ..ScriptedRunner::succeeding()
    };

    let report = deployer(&config, &runner, true).deploy("staging").await;

    assert_eq!(report.failed_at(), Some(DeploymentStep::Deploy));
    assert!(matches!(
        report.error(),
        Some(DeployError::Command {
            step: DeploymentStep::Deploy,
            source: ProcessError::Timeout { .. },
        })
    ));
    assert!(report.health().is_none());
}

#[tokio::test]
async fn background_build_is_detached_and_verified() {
    let (dir, config) = project(&["development"]);
    let runner = ScriptedRunner {
        build_process_listed: true,
        ..ScriptedRunner::succeeding()
    };

    let report = deployer(&config, &runner, true)
        .with_options(DeployOptions {
            build: BuildMode::Background,
            ..DeployOptions::default()
        })
        .deploy("development")
        .await;

    assert!(report.succeeded(), "unexpected error: {:?}", report.error());
    let detached = runner.detached.lock().unwrap().clone();
    assert_eq!(detached.len(), 1);
    assert!(detached[0].0.ends_with("build --no-cache"));
    assert_eq!(detached[0].1, dir.path().join("docker-build.log"));
    assert_eq!(runner.calls(), vec![String::from("pgrep -f docker.compose")]);
    assert!(!report.states().contains(&DeploymentState::Deploying));
}

#[tokio::test]
async fn background_build_without_process_fails() {
    let (_dir, config) = project(&["development"]);
    let runner = ScriptedRunner::succeeding();

    let report = deployer(&config, &runner, true)
        .with_options(DeployOptions {
            build: BuildMode::Background,
            ..DeployOptions::default()
        })
        .deploy("development")
        .await;

    assert_eq!(report.failed_at(), Some(DeploymentStep::Build));
    assert!(matches!(
        report.error(),
        Some(DeployError::BuildNotRunning { .. })
    ));
}

#[tokio::test]
async fn optional_steps_can_be_skipped() {
    let (_dir, config) = project(&["development"]);
    let runner = ScriptedRunner::succeeding();

    let report = deployer(&config, &runner, false)
        .with_options(DeployOptions {
            deploy: false,
            health_check: false,
            ..DeployOptions::default()
        })
        .deploy("development")
        .await;

    assert!(report.succeeded());
    assert_eq!(runner.calls().len(), 1);
    assert_eq!(
        report.states(),
        &[
            DeploymentState::Idle,
            DeploymentState::ValidatingEnv,
            DeploymentState::ValidatingConfig,
            DeploymentState::Building,
            DeploymentState::Done,
        ]
    );
}
