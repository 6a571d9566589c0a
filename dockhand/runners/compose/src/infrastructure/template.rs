use std::{
    fs,
    path::{Path, PathBuf},
};

use dockhand_core::{DeployConfig, Environment};
use serde::Serialize;
use tera::Context as TeraContext;
use tracing::info;

use crate::errors::ScaffoldError;

const COMPOSE_TEMPLATE: &str = include_str!("../../assets/docker-compose.yml.tera");

/// Values substituted into the compose template.
#[derive(Clone, Debug, Serialize)]
pub struct ComposeTemplateContext {
    pub image_name: String,
    pub registry: String,
    pub environment: Environment,
    pub dockerfile: String,
    pub app_port: u16,
}

impl ComposeTemplateContext {
    #[must_use]
    pub fn new(config: &DeployConfig, environment: Environment) -> Self {
        Self {
            image_name: config.image_name.clone(),
            registry: config.registry.clone(),
            environment,
            dockerfile: config.settings(environment).dockerfile.clone(),
            app_port: if environment.is_production() { 80 } else { 8080 },
        }
    }
}

/// Render the compose template for `context`.
pub fn render_compose(context: &ComposeTemplateContext) -> Result<String, ScaffoldError> {
    let context =
        TeraContext::from_serialize(context).map_err(|source| ScaffoldError::Render { source })?;
    tera::Tera::one_off(COMPOSE_TEMPLATE, &context, false)
        .map_err(|source| ScaffoldError::Render { source })
}

/// Write `docker/docker-compose.<env>.yml` for the project, refusing to
/// replace an existing file unless `force` is set.
pub fn write_compose_file(
    config: &DeployConfig,
    environment: Environment,
    force: bool,
) -> Result<PathBuf, ScaffoldError> {
    let path = config.compose_file(environment);
    if path.exists() && !force {
        return Err(ScaffoldError::AlreadyExists { path });
    }

    let rendered = render_compose(&ComposeTemplateContext::new(config, environment))?;
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(&path, rendered).map_err(|source| ScaffoldError::Write {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), environment = %environment, "compose file written");
    Ok(path)
}

fn create_dir(dir: &Path) -> Result<(), ScaffoldError> {
    fs::create_dir_all(dir).map_err(|source| ScaffoldError::Write {
        path: dir.to_path_buf(),
        source,
    })
}
