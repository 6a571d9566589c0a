pub mod config;
pub mod constants;
pub mod health;
pub mod process;
pub mod readiness;
pub mod render;

use std::{env, time::Duration};

pub use config::{ConfigError, DeployConfig, Environment, EnvironmentSettings};
pub use health::{HealthAggregator, HealthCheckResult, HealthProbe, HealthReport, HealthStatus};
pub use process::{CommandOutput, CommandSpec, ProcessError, ProcessRunner, SystemProcessRunner};
pub use readiness::{ProbeOutcome, probe, probe_with_observer};
pub use render::OutputFormat;

/// Environment variable holding a multiplier applied to every subprocess and
/// readiness timeout.
pub const TIMEOUT_SCALE_ENV: &str = "DOCKHAND_TIMEOUT_SCALE";

/// Scale a timeout by `DOCKHAND_TIMEOUT_SCALE` (slow CI hosts, emulated
/// architectures). Invalid or non-positive values leave the timeout unchanged.
#[must_use]
pub fn adjust_timeout(base: Duration) -> Duration {
    env::var(TIMEOUT_SCALE_ENV)
        .ok()
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|scale| scale.is_finite() && *scale > 0.0)
        .map_or(base, |scale| base.mul_f64(scale))
}
