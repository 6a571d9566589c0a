use dockhand_core::{DeployConfig, Environment};
use dockhand_runner_compose::write_compose_file;

pub fn run(config: &DeployConfig, environment: Environment, force: bool) -> anyhow::Result<()> {
    let path = write_compose_file(config, environment, force)?;
    println!("Created {}", path.display());
    println!("Next: dockhand deploy --environment={environment}");
    Ok(())
}
