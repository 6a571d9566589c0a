use std::path::PathBuf;

use dockhand_core::{DeployConfig, Environment};
use tracing::debug;

use crate::errors::DeployError;

/// Parse the requested environment name against the fixed set.
pub fn validate_environment(raw: &str) -> Result<Environment, DeployError> {
    raw.parse::<Environment>()
        .map_err(|_| DeployError::InvalidEnvironment {
            value: raw.to_owned(),
            allowed: Environment::allowed(),
        })
}

/// Ensure the environment's compose file exists, returning its path.
pub fn validate_configuration(
    config: &DeployConfig,
    environment: Environment,
) -> Result<PathBuf, DeployError> {
    let path = config.compose_file(environment);
    if path.is_file() {
        debug!(path = %path.display(), "compose file present");
        Ok(path)
    } else {
        Err(DeployError::MissingConfiguration {
            path,
            environment: environment.to_string(),
        })
    }
}
