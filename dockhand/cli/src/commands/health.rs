use std::io::Write;

use anyhow::bail;
use dockhand_core::{DeployConfig, Environment, HealthAggregator, OutputFormat, render};
use tracing::info;

pub async fn run(
    config: &DeployConfig,
    environment: Environment,
    format: OutputFormat,
) -> anyhow::Result<()> {
    info!(environment = %environment, "running health checks");
    run_with(
        &HealthAggregator::standard(config),
        format,
        &mut std::io::stdout(),
    )
    .await
}

/// Run every probe, write the report to `out` and fail when any service is
/// unhealthy.
pub async fn run_with(
    aggregator: &HealthAggregator,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let report = aggregator.run().await;
    writeln!(out, "{}", render::health(&report, format)?)?;

    if !report.is_healthy() {
        let failed: Vec<&str> = report.unhealthy().map(|result| result.service()).collect();
        bail!("health checks failed for: {}", failed.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use dockhand_core::{HealthCheckResult, HealthProbe};

    use super::*;

    struct FixedProbe {
        service: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl HealthProbe for FixedProbe {
        fn service(&self) -> &str {
            self.service
        }

        async fn check(&self) -> anyhow::Result<HealthCheckResult> {
            Ok(if self.healthy {
                HealthCheckResult::healthy(self.service, "ok")
            } else {
                HealthCheckResult::unhealthy(self.service, "Database connection failed")
            })
        }
    }

    fn aggregator(database_healthy: bool) -> HealthAggregator {
        let services = ["Application", "Database", "Cache", "Storage", "Container"];
        let probes: Vec<Box<dyn HealthProbe>> = services
            .into_iter()
            .map(|service| {
                Box::new(FixedProbe {
                    service,
                    healthy: service != "Database" || database_healthy,
                }) as Box<dyn HealthProbe>
            })
            .collect();
        HealthAggregator::new(probes)
    }

    #[tokio::test]
    async fn unhealthy_database_fails_the_command_after_printing() {
        let mut out = Vec::new();

        let err = run_with(&aggregator(false), OutputFormat::Json, &mut out)
            .await
            .expect_err("unhealthy database must fail");

        assert!(err.to_string().contains("Database"));
        let printed: serde_json::Value = serde_json::from_slice(&out).expect("json report");
        assert_eq!(printed["Database"]["status"], "unhealthy");
        assert_eq!(printed["Application"]["status"], "healthy");
    }

    #[tokio::test]
    async fn all_healthy_succeeds() {
        let mut out = Vec::new();

        run_with(&aggregator(true), OutputFormat::Table, &mut out)
            .await
            .expect("healthy");

        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("Database"));
        assert!(!printed.contains("Unhealthy"));
    }
}
