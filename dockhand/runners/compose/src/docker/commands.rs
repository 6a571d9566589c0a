use std::path::PathBuf;

use dockhand_core::{
    CommandSpec, DeployConfig, Environment, ProcessRunner, adjust_timeout,
    constants::DEFAULT_QUERY_TIMEOUT,
};
use tracing::{debug, warn};

/// Builds orchestration CLI invocations for one environment's compose file.
#[derive(Clone, Debug)]
pub struct ComposeCli<'a> {
    config: &'a DeployConfig,
    environment: Environment,
}

impl<'a> ComposeCli<'a> {
    #[must_use]
    pub const fn new(config: &'a DeployConfig, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    #[must_use]
    pub fn compose_file(&self) -> PathBuf {
        self.config.compose_file(self.environment)
    }

    fn base(&self) -> CommandSpec {
        let compose_file = self.config.compose_file_relative(self.environment);
        CommandSpec::new(self.config.compose.program.clone())
            .args(self.config.compose.base_args.iter().cloned())
            .arg("-f")
            .arg(compose_file.to_string_lossy())
            .current_dir(&self.config.project_root)
    }

    /// `build --no-cache` bounded by the environment's build timeout.
    #[must_use]
    pub fn build(&self) -> CommandSpec {
        let settings = self.config.settings(self.environment);
        self.base()
            .args(["build", "--no-cache"])
            .timeout(adjust_timeout(settings.build_timeout()))
    }

    /// `up -d --remove-orphans` bounded by the environment's deploy timeout.
    #[must_use]
    pub fn up(&self) -> CommandSpec {
        let settings = self.config.settings(self.environment);
        self.base()
            .args(["up", "-d", "--remove-orphans"])
            .timeout(adjust_timeout(settings.deploy_timeout()))
    }

    /// `ps --format table`.
    #[must_use]
    pub fn ps(&self) -> CommandSpec {
        self.base()
            .args(["ps", "--format", "table"])
            .timeout(adjust_timeout(DEFAULT_QUERY_TIMEOUT))
    }
}

/// `pgrep -f <pattern>` invocation.
#[must_use]
pub fn process_listing(pattern: &str) -> CommandSpec {
    CommandSpec::new("pgrep")
        .args(["-f", pattern])
        .timeout(adjust_timeout(DEFAULT_QUERY_TIMEOUT))
}

/// `docker ps -q` invocation listing running container ids.
#[must_use]
pub fn running_containers() -> CommandSpec {
    CommandSpec::new("docker")
        .args(["ps", "-q"])
        .timeout(adjust_timeout(DEFAULT_QUERY_TIMEOUT))
}

/// True when a process matching `pattern` is listed. Listing failures count
/// as "not running".
pub async fn is_process_running<R>(runner: &R, pattern: &str) -> bool
where
    R: ProcessRunner + ?Sized,
{
    match runner.run(&process_listing(pattern)).await {
        Ok(output) => {
            debug!(pattern, found = output.success, "process listing finished");
            output.success
        }
        Err(err) => {
            warn!(pattern, "process listing failed: {err}");
            false
        }
    }
}

/// True when the container runtime lists at least one running container.
pub async fn has_running_containers<R>(runner: &R) -> bool
where
    R: ProcessRunner + ?Sized,
{
    match runner.run(&running_containers()).await {
        Ok(output) => output.success && !output.stdout.trim().is_empty(),
        Err(err) => {
            warn!("container listing failed: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn config() -> DeployConfig {
        DeployConfig {
            project_root: PathBuf::from("/srv/app"),
            ..DeployConfig::default()
        }
    }

    #[test]
    fn build_uses_environment_compose_file_and_no_cache() {
        let config = config();
        let spec = ComposeCli::new(&config, Environment::Staging).build();

        assert_eq!(
            spec.display(),
            "docker compose -f docker/docker-compose.staging.yml build --no-cache"
        );
        assert_eq!(spec.working_dir(), Some(Path::new("/srv/app")));
        assert_eq!(
            spec.timeout_duration(),
            adjust_timeout(config.settings(Environment::Staging).build_timeout())
        );
    }

    #[test]
    fn up_runs_detached_and_removes_orphans() {
        let mut config = config();
        config.compose = dockhand_core::config::ComposeCliConfig::from_command_line("docker-compose")
            .expect("compose cli");
        let spec = ComposeCli::new(&config, Environment::Production).up();

        assert_eq!(
            spec.display(),
            "docker-compose -f docker/docker-compose.production.yml up -d --remove-orphans"
        );
    }

    #[test]
    fn ps_requests_table_format() {
        let config = config();
        let spec = ComposeCli::new(&config, Environment::Development).ps();

        assert!(spec.display().ends_with("ps --format table"));
    }
}
