use dockhand_core::{DeployConfig, Environment, OutputFormat, SystemProcessRunner};
use dockhand_runner_compose::{StatusReporter, render_status};

pub async fn run(
    config: &DeployConfig,
    environment: Environment,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = StatusReporter::new(config, SystemProcessRunner::new())
        .report(environment)
        .await;
    println!("{}", render_status(&report, format)?);
    Ok(())
}
