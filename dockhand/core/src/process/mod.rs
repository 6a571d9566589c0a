mod system;

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
pub use system::SystemProcessRunner;

use crate::constants::DEFAULT_QUERY_TIMEOUT;

/// Errors that prevent a command from producing an exit status.
///
/// A command that runs and exits non-zero is not an error; see
/// [`CommandOutput::success`].
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} timed out after {timeout:?} and was terminated")]
    Timeout { command: String, timeout: Duration },
    #[error("failed waiting for {command}: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to open log file {path} for {command}: {source}")]
    LogFile {
        command: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A command line with its working directory and timeout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Build a spec from an argv-style vector; `None` when it is empty.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args.iter().cloned()))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    #[must_use]
    pub const fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// Human readable command line used in logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status plus captured output of a finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Capability to run external commands; injected so callers can be exercised
/// without a container runtime.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, capturing output. Non-zero exits are returned as
    /// unsuccessful output; exceeding the timeout kills the process.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;

    /// Start a detached process whose stdout and stderr are appended to
    /// `log_path`, returning its pid without waiting.
    async fn spawn_detached(&self, spec: &CommandSpec, log_path: &Path)
    -> Result<u32, ProcessError>;
}

#[async_trait]
impl<T> ProcessRunner for &T
where
    T: ProcessRunner + ?Sized,
{
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        (**self).run(spec).await
    }

    async fn spawn_detached(
        &self,
        spec: &CommandSpec,
        log_path: &Path,
    ) -> Result<u32, ProcessError> {
        (**self).spawn_detached(spec, log_path).await
    }
}
