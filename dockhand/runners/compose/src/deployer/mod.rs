pub mod orchestrator;
pub mod setup;

use std::{fmt, time::Duration};

use dockhand_core::{
    DeployConfig, Environment, HealthAggregator, HealthReport, ProcessRunner,
    constants::{BACKGROUND_BUILD_GRACE, DEFAULT_HEALTH_RETRY_DELAY},
};

use crate::errors::DeployError;

/// States a deployment moves through. `Failed` is absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentState {
    Idle,
    ValidatingEnv,
    ValidatingConfig,
    Building,
    Deploying,
    HealthChecking,
    Done,
    Failed,
}

impl DeploymentState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Units of work executed by the orchestrator, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentStep {
    ValidateEnvironment,
    ValidateConfiguration,
    Build,
    Deploy,
    HealthCheck,
}

impl DeploymentStep {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ValidateEnvironment => "Validating environment",
            Self::ValidateConfiguration => "Validating configuration",
            Self::Build => "Building containers",
            Self::Deploy => "Deploying containers",
            Self::HealthCheck => "Running health checks",
        }
    }
}

impl fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    pub step: DeploymentStep,
    pub success: bool,
    pub detail: String,
}

/// Outcome of one deployment run: visited states, executed steps and the
/// error that stopped it, if any.
#[derive(Debug)]
pub struct DeploymentReport {
    environment: Option<Environment>,
    states: Vec<DeploymentState>,
    steps: Vec<StepRecord>,
    health: Option<HealthReport>,
    error: Option<DeployError>,
}

impl Default for DeploymentReport {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentReport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            environment: None,
            states: vec![DeploymentState::Idle],
            steps: Vec::new(),
            health: None,
            error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> DeploymentState {
        self.states
            .last()
            .copied()
            .unwrap_or(DeploymentState::Idle)
    }

    #[must_use]
    pub fn states(&self) -> &[DeploymentState] {
        &self.states
    }

    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    #[must_use]
    pub const fn environment(&self) -> Option<Environment> {
        self.environment
    }

    #[must_use]
    pub const fn health(&self) -> Option<&HealthReport> {
        self.health.as_ref()
    }

    #[must_use]
    pub const fn error(&self) -> Option<&DeployError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state() == DeploymentState::Done
    }

    /// The step whose failure moved the run to `Failed`.
    #[must_use]
    pub fn failed_at(&self) -> Option<DeploymentStep> {
        self.steps
            .iter()
            .find(|record| !record.success)
            .map(|record| record.step)
    }

    pub(crate) fn enter(&mut self, state: DeploymentState) {
        if self.state().is_terminal() {
            return;
        }
        tracing::debug!(from = ?self.state(), to = ?state, "deployment state transition");
        self.states.push(state);
    }

    pub(crate) fn passed(&mut self, step: DeploymentStep, detail: impl Into<String>) {
        self.steps.push(StepRecord {
            step,
            success: true,
            detail: detail.into(),
        });
    }

    pub(crate) fn failed(&mut self, step: DeploymentStep, error: DeployError) -> DeployError {
        self.steps.push(StepRecord {
            step,
            success: false,
            detail: error.to_string(),
        });
        self.enter(DeploymentState::Failed);
        error
    }

    pub(crate) fn set_environment(&mut self, environment: Environment) {
        self.environment = Some(environment);
    }

    pub(crate) fn set_health(&mut self, health: HealthReport) {
        self.health = Some(health);
    }

    pub(crate) fn set_error(&mut self, error: DeployError) {
        self.error = Some(error);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildMode {
    #[default]
    Foreground,
    /// Detached build logging to the project build log; deploy and health
    /// steps are skipped.
    Background,
}

/// Which optional steps run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployOptions {
    pub build: BuildMode,
    pub deploy: bool,
    pub health_check: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            build: BuildMode::Foreground,
            deploy: true,
            health_check: true,
        }
    }
}

/// Compose-based deployer for one project.
pub struct Deployer<'a, R> {
    config: &'a DeployConfig,
    runner: R,
    health: HealthAggregator,
    options: DeployOptions,
    settle_time: Option<Duration>,
    health_retry_delay: Duration,
    background_grace: Duration,
}

impl<'a, R> Deployer<'a, R>
where
    R: ProcessRunner,
{
    /// Deployer using the standard health probes for `config`.
    #[must_use]
    pub fn new(config: &'a DeployConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            health: HealthAggregator::standard(config),
            options: DeployOptions::default(),
            settle_time: None,
            health_retry_delay: DEFAULT_HEALTH_RETRY_DELAY,
            background_grace: BACKGROUND_BUILD_GRACE,
        }
    }

    #[must_use]
    pub fn with_health(mut self, health: HealthAggregator) -> Self {
        self.health = health;
        self
    }

    #[must_use]
    pub const fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the environment's settle time after `up`.
    #[must_use]
    pub const fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = Some(settle_time);
        self
    }

    #[must_use]
    pub const fn with_health_retry_delay(mut self, delay: Duration) -> Self {
        self.health_retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_background_grace(mut self, grace: Duration) -> Self {
        self.background_grace = grace;
        self
    }

    /// Run the deployment for the raw environment name.
    pub async fn deploy(&self, environment: &str) -> DeploymentReport {
        orchestrator::DeploymentOrchestrator::new(self)
            .run(environment)
            .await
    }

    /// Deploy and turn a failed run into its error.
    pub async fn deploy_checked(&self, environment: &str) -> Result<DeploymentReport, DeployError> {
        let mut report = self.deploy(environment).await;
        match report.error.take() {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }
}
