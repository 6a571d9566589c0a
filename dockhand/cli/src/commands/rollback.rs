use dockhand_core::Environment;
use dockhand_runner_compose::rollback;

pub fn run(environment: Environment, target: &str) -> anyhow::Result<()> {
    println!("Rolling back {environment} deployment to {target}...");
    println!("Rollback functionality is not yet implemented. This would:");
    for step in rollback(environment, target) {
        println!("{step}");
    }
    Ok(())
}
