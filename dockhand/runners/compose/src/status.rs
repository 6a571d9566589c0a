use std::{collections::VecDeque, path::Path};

use dockhand_core::{
    DeployConfig, Environment, OutputFormat, ProcessRunner, constants::BUILD_LOG_TAIL_LINES,
    render,
};
use serde::Serialize;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt as _, BufReader},
};
use tracing::{debug, warn};

use crate::docker::commands::{ComposeCli, has_running_containers, is_process_running};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Building,
    Completed,
    NotStarted,
}

impl BuildStatus {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Building => "Docker build in progress",
            Self::Completed => "Build completed, containers running",
            Self::NotStarted => "No build process detected",
        }
    }
}

/// One row of the orchestration CLI's container listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerStatus {
    pub name: String,
    pub state: String,
    pub ports: String,
}

impl ContainerStatus {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.contains("Up")
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub environment: Environment,
    pub build: BuildStatus,
    pub containers: Vec<ContainerStatus>,
    pub container_message: String,
    /// Last lines of the background build log, when one exists.
    pub build_log: Option<Vec<String>>,
}

/// Best-effort snapshot of build and container state; listing failures
/// degrade to "nothing found".
pub struct StatusReporter<'a, R> {
    config: &'a DeployConfig,
    runner: R,
}

impl<'a, R> StatusReporter<'a, R>
where
    R: ProcessRunner,
{
    pub const fn new(config: &'a DeployConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub async fn report(&self, environment: Environment) -> StatusReport {
        let build = self.build_status().await;
        let (containers, container_message) = self.containers(environment).await;
        let build_log = read_log_tail(&self.config.build_log_path(), BUILD_LOG_TAIL_LINES).await;

        StatusReport {
            environment,
            build,
            containers,
            container_message,
            build_log,
        }
    }

    pub async fn build_status(&self) -> BuildStatus {
        if is_process_running(&self.runner, &self.config.compose.process_pattern).await {
            BuildStatus::Building
        } else if has_running_containers(&self.runner).await {
            BuildStatus::Completed
        } else {
            BuildStatus::NotStarted
        }
    }

    async fn containers(&self, environment: Environment) -> (Vec<ContainerStatus>, String) {
        let cli = ComposeCli::new(self.config, environment);
        if !cli.compose_file().is_file() {
            return (Vec::new(), String::from("Docker compose file not found"));
        }

        match self.runner.run(&cli.ps()).await {
            Ok(output) if output.success => (
                parse_ps_output(&output.stdout),
                String::from("Container status retrieved"),
            ),
            Ok(output) => {
                warn!(code = ?output.code, stderr = %output.stderr.trim(), "container listing failed");
                (Vec::new(), String::from("Failed to get container status"))
            }
            Err(err) => {
                warn!("container listing failed: {err}");
                (Vec::new(), String::from("Failed to get container status"))
            }
        }
    }
}

/// Parse `ps --format table` output by whitespace splitting. Blank lines,
/// header lines and rows with fewer than three columns are skipped.
#[must_use]
pub fn parse_ps_output(output: &str) -> Vec<ContainerStatus> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.contains("Name") && !line.contains("NAME"))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 3 {
                debug!(line, "skipping short container listing line");
                return None;
            }
            Some(ContainerStatus {
                name: columns[0].to_owned(),
                state: columns[2].to_owned(),
                ports: columns.get(5).copied().unwrap_or("none").to_owned(),
            })
        })
        .collect()
}

/// Stream the log, keeping only the last `lines` lines in memory.
async fn read_log_tail(path: &Path, lines: usize) -> Option<Vec<String>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            debug!(path = %path.display(), "no build log: {err}");
            return None;
        }
    };

    let mut reader = BufReader::new(file);
    let mut tail = VecDeque::with_capacity(lines + 1);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                tail.push_back(text.trim_end_matches(['\n', '\r']).to_owned());
                if tail.len() > lines {
                    tail.pop_front();
                }
            }
            Err(err) => {
                warn!(path = %path.display(), "failed reading build log: {err}");
                break;
            }
        }
    }

    Some(tail.into_iter().collect())
}

/// Render a status report as text sections or JSON.
pub fn render_status(report: &StatusReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => render::json(report),
        OutputFormat::Table => Ok(status_text(report)),
    }
}

fn status_text(report: &StatusReport) -> String {
    let mut out = format!(
        "Docker status for {} environment\n\nBuild Status:\n{}\n\n",
        report.environment,
        report.build.message()
    );

    match &report.build_log {
        Some(lines) => {
            out.push_str(&format!(
                "Recent build log (last {BUILD_LOG_TAIL_LINES} lines):\n"
            ));
            for line in lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        None => out.push_str("No build log found\n"),
    }
    out.push('\n');

    if report.containers.is_empty() {
        out.push_str(&format!("No containers found ({})\n", report.container_message));
    } else {
        let rows: Vec<Vec<String>> = report
            .containers
            .iter()
            .map(|container| {
                let state = if container.is_running() {
                    "Running"
                } else {
                    "Stopped"
                };
                vec![
                    container.name.clone(),
                    state.to_owned(),
                    container.ports.clone(),
                ]
            })
            .collect();
        out.push_str("Container Status:\n");
        out.push_str(&render::table(&["Container", "Status", "Ports"], &rows));
        out.push('\n');
    }

    out
}
