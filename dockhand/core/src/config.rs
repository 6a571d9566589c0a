use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{
    BUILD_LOG_FILE, COMPOSE_DIR, COMPOSE_FILE_PREFIX, DEFAULT_BUILD_TIMEOUT,
    DEFAULT_DEPLOY_TIMEOUT, DEFAULT_SETTLE_TIME, PROJECT_CONFIG_FILE,
};

/// Errors loading or interpreting deployment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment: {value} (allowed environments: {allowed})")]
    InvalidEnvironment { value: String, allowed: String },
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Named deployment target selecting the compose file and timing parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Self; 3] = [Self::Development, Self::Staging, Self::Production];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Comma separated list of accepted environment names.
    #[must_use]
    pub fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|env| env.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == value)
            .ok_or_else(|| ConfigError::InvalidEnvironment {
                value: value.to_owned(),
                allowed: Self::allowed(),
            })
    }
}

/// Timing and retry parameters for one environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentSettings {
    pub dockerfile: String,
    pub health_check_retries: u32,
    pub build_timeout_secs: u64,
    pub deploy_timeout_secs: u64,
    pub settle_secs: u64,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            dockerfile: String::from("Dockerfile"),
            health_check_retries: 3,
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT.as_secs(),
            deploy_timeout_secs: DEFAULT_DEPLOY_TIMEOUT.as_secs(),
            settle_secs: DEFAULT_SETTLE_TIME.as_secs(),
        }
    }
}

impl EnvironmentSettings {
    fn production_like(retries: u32) -> Self {
        Self {
            dockerfile: String::from("Dockerfile.production"),
            health_check_retries: retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    #[must_use]
    pub const fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    #[must_use]
    pub const fn settle_time(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

/// Per-environment settings table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentTable {
    pub development: EnvironmentSettings,
    pub staging: EnvironmentSettings,
    pub production: EnvironmentSettings,
}

impl Default for EnvironmentTable {
    fn default() -> Self {
        Self {
            development: EnvironmentSettings::default(),
            staging: EnvironmentSettings::production_like(5),
            production: EnvironmentSettings::production_like(10),
        }
    }
}

/// How to invoke the orchestration CLI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposeCliConfig {
    /// Executable, e.g. `docker` or `docker-compose`.
    pub program: String,
    /// Arguments placed before the compose arguments, e.g. `["compose"]`.
    pub base_args: Vec<String>,
    /// `pgrep -f` pattern matching a running compose process.
    pub process_pattern: String,
}

impl Default for ComposeCliConfig {
    fn default() -> Self {
        Self {
            program: String::from("docker"),
            base_args: vec![String::from("compose")],
            process_pattern: String::from("docker.compose"),
        }
    }
}

impl ComposeCliConfig {
    /// Parse a whitespace separated command such as `docker compose` or
    /// `docker-compose`.
    #[must_use]
    pub fn from_command_line(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self {
            program,
            base_args: parts.collect(),
            ..Self::default()
        })
    }
}

/// Explicit configuration passed into every component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(skip)]
    pub project_root: PathBuf,
    pub image_name: String,
    pub registry: String,
    pub compose: ComposeCliConfig,
    /// Base URL of the application; readiness is checked at `<app_url>/up`.
    pub app_url: String,
    pub database_url: Option<String>,
    pub cache_url: Option<String>,
    /// Object store URL used for the storage round-trip, e.g. `file:///srv/app/storage`.
    pub storage_url: Option<String>,
    /// Command run by `container-start` once the database is reachable.
    pub migrate_command: Option<Vec<String>>,
    /// Commands run by `container-start` in production after migrations.
    pub warm_commands: Vec<Vec<String>>,
    pub environments: EnvironmentTable,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            image_name: String::from("app"),
            registry: String::from("localhost:5000"),
            compose: ComposeCliConfig::default(),
            app_url: String::from("http://localhost"),
            database_url: None,
            cache_url: None,
            storage_url: None,
            migrate_command: None,
            warm_commands: Vec::new(),
            environments: EnvironmentTable::default(),
        }
    }
}

impl DeployConfig {
    /// Build the configuration for `project_root`: defaults, then the YAML
    /// file (explicit path, or `dockhand.yml` when present), then process
    /// environment overrides.
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = project_root.join(PROJECT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    debug!(path = %default_path.display(), "no project config file; using defaults");
                    Self::default()
                }
            }
        };
        config.project_root = project_root.to_path_buf();
        config.apply_overrides(|key| env::var(key).ok().filter(|value| !value.is_empty()));

        info!(
            project_root = %config.project_root.display(),
            compose = %config.compose.program,
            app_url = %config.app_url,
            "deployment configuration loaded"
        );

        Ok(config)
    }

    /// Parse a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DOCKHAND_APP_URL").or_else(|| lookup("APP_URL")) {
            self.app_url = url;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.cache_url = Some(url);
        }
        if let Some(url) = lookup("DOCKHAND_STORAGE_URL") {
            self.storage_url = Some(url);
        }
        if let Some(name) = lookup("DOCKER_IMAGE_NAME") {
            self.image_name = name;
        }
        if let Some(registry) = lookup("DOCKER_REGISTRY") {
            self.registry = registry;
        }
        if let Some(compose) = lookup("DOCKHAND_COMPOSE_BIN")
            .as_deref()
            .and_then(ComposeCliConfig::from_command_line)
        {
            self.compose = compose;
        }
    }

    #[must_use]
    pub const fn settings(&self, environment: Environment) -> &EnvironmentSettings {
        match environment {
            Environment::Development => &self.environments.development,
            Environment::Staging => &self.environments.staging,
            Environment::Production => &self.environments.production,
        }
    }

    /// Compose file path relative to the project root.
    #[must_use]
    pub fn compose_file_relative(&self, environment: Environment) -> PathBuf {
        Path::new(COMPOSE_DIR).join(format!("{COMPOSE_FILE_PREFIX}.{environment}.yml"))
    }

    /// Absolute (project-rooted) compose file path.
    #[must_use]
    pub fn compose_file(&self, environment: Environment) -> PathBuf {
        self.project_root
            .join(self.compose_file_relative(environment))
    }

    #[must_use]
    pub fn build_log_path(&self) -> PathBuf {
        self.project_root.join(BUILD_LOG_FILE)
    }

    #[must_use]
    pub fn health_url(&self) -> String {
        format!("{}/up", self.app_url.trim_end_matches('/'))
    }
}
