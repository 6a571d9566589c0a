use dockhand_core::{DeployConfig, Environment, SystemProcessRunner};
use dockhand_runner_compose::ContainerStarter;

pub async fn run(config: &DeployConfig, environment: Environment) -> anyhow::Result<()> {
    let summary = ContainerStarter::new(config, SystemProcessRunner::new())
        .start(environment)
        .await?;
    println!(
        "Application started (database ready after {} attempt(s), migrations {}, {} warm-up command(s))",
        summary.database_attempts,
        if summary.migrated { "applied" } else { "skipped" },
        summary.warm_commands
    );
    Ok(())
}
