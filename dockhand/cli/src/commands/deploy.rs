use anyhow::bail;
use dockhand_core::{DeployConfig, SystemProcessRunner, render};
use dockhand_runner_compose::{BuildMode, DeployOptions, Deployer, DeploymentReport};

pub async fn run(
    config: &DeployConfig,
    environment: &str,
    background: bool,
    skip_deploy: bool,
    skip_health: bool,
) -> anyhow::Result<()> {
    let options = DeployOptions {
        build: if background {
            BuildMode::Background
        } else {
            BuildMode::Foreground
        },
        deploy: !skip_deploy,
        health_check: !skip_health,
    };

    println!("Starting deployment to {environment} environment...");
    let report = Deployer::new(config, SystemProcessRunner::new())
        .with_options(options)
        .deploy(environment)
        .await;

    println!("{}", steps_table(&report));
    if let Some(health) = report.health() {
        println!("{}", render::health_table(health));
    }
    if let Some(err) = report.error() {
        bail!("{err}");
    }
    println!("Deployment completed successfully!");
    Ok(())
}

fn steps_table(report: &DeploymentReport) -> String {
    let rows: Vec<Vec<String>> = report
        .steps()
        .iter()
        .map(|record| {
            vec![
                record.step.label().to_owned(),
                String::from(if record.success { "ok" } else { "failed" }),
                record.detail.clone(),
            ]
        })
        .collect();
    render::table(&["Step", "Result", "Detail"], &rows)
}
