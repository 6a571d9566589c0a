use std::time::Duration;

/// Project-relative directory holding one compose file per environment.
pub const COMPOSE_DIR: &str = "docker";

/// Compose file name prefix; files are named `<prefix>.<environment>.yml`.
pub const COMPOSE_FILE_PREFIX: &str = "docker-compose";

/// Project-relative log file receiving output of backgrounded builds.
pub const BUILD_LOG_FILE: &str = "docker-build.log";

/// Optional project-level configuration file.
pub const PROJECT_CONFIG_FILE: &str = "dockhand.yml";

/// Foreground image builds compile native extensions and can take minutes.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for `up -d`.
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(180);

/// Grace period after `up -d` before probing the stack.
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(5);

/// Timeout for quick listing queries (`ps`, `pgrep`).
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before checking that a backgrounded build process exists.
pub const BACKGROUND_BUILD_GRACE: Duration = Duration::from_secs(2);

/// Delay between health aggregation attempts during a deployment.
pub const DEFAULT_HEALTH_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Per-request timeout for individual health probes.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts made while waiting for the database in `container-start`.
pub const DATABASE_WAIT_ATTEMPTS: u32 = 30;

/// Delay between database wait attempts in `container-start`.
pub const DATABASE_WAIT_DELAY: Duration = Duration::from_secs(2);

/// Number of trailing build log lines shown by the status command.
pub const BUILD_LOG_TAIL_LINES: usize = 10;
