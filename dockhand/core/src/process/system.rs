use std::{
    fs::OpenOptions,
    path::Path,
    process::{Command as StdCommand, Stdio},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt as _},
    process::Command,
    time::timeout,
};
use tracing::{debug, info, warn};

use super::{CommandOutput, CommandSpec, ProcessError, ProcessRunner};

/// Runs commands as real OS processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let description = spec.display();
        let mut command = Command::new(spec.program());
        command
            .args(spec.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = spec.working_dir() {
            command.current_dir(dir);
        }
        // Descendants share the group and are terminated with it on timeout.
        #[cfg(unix)]
        command.process_group(0);

        debug!(command = %description, timeout = ?spec.timeout_duration(), "running command");
        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            command: description.clone(),
            source,
        })?;
        let pid = child.id();

        let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        // Output pipes stay open while any descendant holds them, so the
        // deadline covers draining as well as the exit of the direct child.
        let completion = async {
            let status = child.wait().await;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            (status, stdout, stderr)
        };

        let outcome = timeout(spec.timeout_duration(), completion).await;
        match outcome {
            Ok((Ok(status), stdout, stderr)) => {
                debug!(command = %description, code = ?status.code(), "command finished");
                Ok(CommandOutput {
                    success: status.success(),
                    code: status.code(),
                    stdout,
                    stderr,
                })
            }
            Ok((Err(source), ..)) => Err(ProcessError::Wait {
                command: description,
                source,
            }),
            Err(_) => {
                warn!(command = %description, timeout = ?spec.timeout_duration(), "command timed out; terminating");
                terminate_group(pid, &description);
                if let Err(err) = child.kill().await {
                    debug!(command = %description, "direct child already gone: {err}");
                }
                stdout_task.abort();
                stderr_task.abort();
                Err(ProcessError::Timeout {
                    command: description,
                    timeout: spec.timeout_duration(),
                })
            }
        }
    }

    async fn spawn_detached(
        &self,
        spec: &CommandSpec,
        log_path: &Path,
    ) -> Result<u32, ProcessError> {
        let description = spec.display();
        let log_error = |source| ProcessError::LogFile {
            command: description.clone(),
            path: log_path.to_path_buf(),
            source,
        };
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(log_error)?;
        let log_err = log.try_clone().map_err(log_error)?;

        let mut command = StdCommand::new(spec.program());
        command
            .args(spec.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        if let Some(dir) = spec.working_dir() {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            // Own process group so terminal signals aimed at us do not reach it.
            command.process_group(0);
        }

        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            command: description.clone(),
            source,
        })?;
        let pid = child.id();
        info!(command = %description, pid, log = %log_path.display(), "detached process started");

        Ok(pid)
    }
}

#[cfg(unix)]
fn terminate_group(pid: Option<u32>, description: &str) {
    use nix::{
        sys::signal::{Signal, killpg},
        unistd::Pid,
    };

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(command = %description, pgid = pid, "process group already gone: {err}");
    }
}

#[cfg(not(unix))]
fn terminate_group(_pid: Option<u32>, _description: &str) {}

async fn read_stream<R>(stream: Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(err) = stream.read_to_end(&mut buffer).await {
            debug!("failed to read command output: {err}");
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
