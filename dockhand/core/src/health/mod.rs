mod probes;

use std::{any::Any, collections::BTreeMap, fmt, panic::AssertUnwindSafe, time::Duration};

use async_trait::async_trait;
use futures::FutureExt as _;
pub use probes::{
    ApplicationProbe, CacheProbe, ContainerProbe, DatabaseProbe, StorageProbe, format_bytes,
    ping_database,
};
use serde::{Serialize, Serializer, ser::SerializeMap as _};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::{DeployConfig, constants::DEFAULT_PROBE_TIMEOUT};

/// Health of a single service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// Outcome of one probe. Never mutated once produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    #[serde(skip)]
    service: String,
    status: HealthStatus,
    message: String,
    details: BTreeMap<String, String>,
}

impl HealthCheckResult {
    #[must_use]
    pub fn healthy(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(service, HealthStatus::Healthy, message)
    }

    #[must_use]
    pub fn unhealthy(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(service, HealthStatus::Unhealthy, message)
    }

    fn new(service: impl Into<String>, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub const fn status(&self) -> HealthStatus {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }

    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}

/// A named check against one dependent service.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn service(&self) -> &str;

    /// Errors are reported as an unhealthy result by the aggregator.
    async fn check(&self) -> anyhow::Result<HealthCheckResult>;
}

/// Ordered results of one aggregation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthReport {
    results: Vec<HealthCheckResult>,
}

impl HealthReport {
    #[must_use]
    pub const fn new(results: Vec<HealthCheckResult>) -> Self {
        Self { results }
    }

    /// Healthy iff every individual result is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.results.iter().all(HealthCheckResult::is_healthy)
    }

    #[must_use]
    pub fn status(&self) -> HealthStatus {
        if self.is_healthy() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    #[must_use]
    pub fn results(&self) -> &[HealthCheckResult] {
        &self.results
    }

    #[must_use]
    pub fn get(&self, service: &str) -> Option<&HealthCheckResult> {
        self.results.iter().find(|result| result.service == service)
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &HealthCheckResult> {
        self.results.iter().filter(|result| !result.is_healthy())
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for result in &self.results {
            map.serialize_entry(&result.service, result)?;
        }
        map.end()
    }
}

/// Runs a fixed ordered set of probes and reduces them to one report.
pub struct HealthAggregator {
    probes: Vec<Box<dyn HealthProbe>>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    #[must_use]
    pub fn new(probes: Vec<Box<dyn HealthProbe>>) -> Self {
        Self {
            probes,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Application, Database, Cache, Storage and Container probes for `config`.
    #[must_use]
    pub fn standard(config: &DeployConfig) -> Self {
        Self::new(vec![
            Box::new(ApplicationProbe::new(config.health_url())),
            Box::new(DatabaseProbe::new(config.database_url.clone())),
            Box::new(CacheProbe::new(config.cache_url.clone())),
            Box::new(StorageProbe::new(config.storage_url.clone())),
            Box::new(ContainerProbe::new()),
        ])
    }

    #[must_use]
    pub const fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    #[must_use]
    pub fn services(&self) -> Vec<&str> {
        self.probes.iter().map(|probe| probe.service()).collect()
    }

    /// Run every probe in order. A probe that errors, panics or exceeds the
    /// probe timeout yields an unhealthy result; later probes still run.
    pub async fn run(&self) -> HealthReport {
        let mut results = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let result = self.run_probe(probe.as_ref()).await;
            if result.is_healthy() {
                info!(service = result.service(), message = result.message(), "health check passed");
            } else {
                warn!(
                    service = result.service(),
                    message = result.message(),
                    details = ?result.details(),
                    "health check failed"
                );
            }
            results.push(result);
        }

        HealthReport::new(results)
    }

    async fn run_probe(&self, probe: &dyn HealthProbe) -> HealthCheckResult {
        let service = probe.service().to_owned();
        let guarded = AssertUnwindSafe(probe.check()).catch_unwind();

        let result = match timeout(self.probe_timeout, guarded).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(err))) => HealthCheckResult::unhealthy(
                service.clone(),
                format!("{service} health check failed"),
            )
            .with_detail("error", format!("{err:#}")),
            Ok(Err(panic)) => HealthCheckResult::unhealthy(
                service.clone(),
                format!("{service} health check failed"),
            )
            .with_detail("error", format!("probe panicked: {}", panic_message(&*panic))),
            Err(_) => HealthCheckResult::unhealthy(
                service.clone(),
                format!("{service} health check timed out"),
            )
            .with_detail("timeout", format!("{:?}", self.probe_timeout)),
        };

        HealthCheckResult { service, ..result }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"))
}
