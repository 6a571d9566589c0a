use dockhand_core::Environment;
use tracing::{info, warn};

/// Steps a rollback would perform once implemented.
pub const ROLLBACK_STEPS: [&str; 4] = [
    "Stop current containers",
    "Restore previous container images",
    "Start previous deployment",
    "Run health checks",
];

/// Placeholder: reports the rollback plan without touching containers.
pub fn rollback(environment: Environment, target: &str) -> Vec<String> {
    info!(environment = %environment, target, "rolling back deployment");
    warn!("rollback is not implemented yet; no containers were changed");

    ROLLBACK_STEPS
        .iter()
        .enumerate()
        .map(|(idx, step)| format!("{}. {step}", idx + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_planned_steps_in_order() {
        let plan = rollback(Environment::Production, "previous");

        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0], "1. Stop current containers");
        assert_eq!(plan[3], "4. Run health checks");
    }
}
