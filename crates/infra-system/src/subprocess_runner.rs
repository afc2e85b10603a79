// Subprocess runner implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};

use readflow_core::application::constants::GRACEFUL_SHUTDOWN_TIMEOUT;
use readflow_core::domain::CommandSpec;
use readflow_core::port::command_runner::{
    CommandOutput, CommandRunner, ExecutionError, ExecutionStatus,
};
use readflow_core::port::TimeProvider;

/// Subprocess runner
/// Spawns external tools with a cleared environment plus an allowlist
pub struct SubprocessRunner {
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
}

impl SubprocessRunner {
    /// Create a new subprocess runner
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    /// * `env_allowlist` - Variables inherited from this process (e.g. PATH, HOME)
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessRunner::new(
    ///     Arc::new(SystemTimeProvider),
    ///     vec!["PATH".to_string(), "HOME".to_string()],
    /// );
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, env_allowlist: Vec<String>) -> Self {
        Self {
            time_provider,
            env_allowlist,
        }
    }

    /// Allowlisted variables from the current process, overridden by the command's own env
    fn child_env(&self, spec_env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = std::env::vars()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect();
        env.extend(spec_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Child, ExecutionError> {
        Command::new(&spec.program)
            .args(&spec.args)
            .env_clear()
            .envs(self.child_env(&spec.env))
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed {
                program: spec.program.clone(),
                reason: e.to_string(),
            })
    }

    /// Spawn child process and collect its output, enforcing the timeout
    async fn spawn_and_wait(
        &self,
        spec: &CommandSpec,
    ) -> Result<std::process::Output, ExecutionError> {
        let mut child = self.spawn(spec)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let collect = async {
            let (status, stdout, stderr) =
                tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))?;
            Ok::<_, std::io::Error>(std::process::Output {
                status,
                stdout,
                stderr,
            })
        };

        let collected = match spec.timeout {
            None => collect.await,
            Some(limit) => match timeout(limit, collect).await {
                Ok(collected) => collected,
                Err(_) => {
                    warn!(program = %spec.program, timeout_ms = %limit.as_millis(), "Subprocess timed out");
                    terminate(&mut child).await;
                    return Err(ExecutionError::Timeout(limit.as_millis() as i64));
                }
            },
        };

        collected.map_err(|e| ExecutionError::IoError(e.to_string()))
    }

    /// Build command output from process output
    fn build_output(&self, output: std::process::Output, duration_ms: i64) -> CommandOutput {
        let status = if output.status.success() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };

        CommandOutput {
            status,
            exit_code: output.status.code(),
            duration_ms,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        let start_time = self.time_provider.now_millis();

        info!(
            command = %spec.display(),
            working_dir = %spec.working_dir.display(),
            timeout_ms = ?spec.timeout.map(|t| t.as_millis()),
            "Starting subprocess"
        );

        let output = self.spawn_and_wait(spec).await?;
        if let Some(signal) = termination_signal(&output.status) {
            warn!(program = %spec.program, signal, "Subprocess killed by signal");
            return Err(ExecutionError::Killed(format!(
                "{} terminated by signal {}",
                spec.program, signal
            )));
        }
        let duration_ms = self.time_provider.now_millis() - start_time;
        let result = self.build_output(output, duration_ms);

        if result.success() {
            info!(
                program = %spec.program,
                duration_ms = %duration_ms,
                exit_code = ?result.exit_code,
                "Subprocess completed"
            );
        } else {
            warn!(
                program = %spec.program,
                duration_ms = %duration_ms,
                exit_code = ?result.exit_code,
                stderr = %result.stderr_tail(5),
                "Subprocess exited unsuccessfully"
            );
        }

        Ok(result)
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Signal that ended the process, if it did not exit on its own
#[cfg(unix)]
fn termination_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// SIGTERM first, then SIGKILL if the process outlives the grace period
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(pid as i32);
        if kill(pid, Signal::SIGTERM).is_ok() {
            info!(pid = %pid, "Sent SIGTERM to timed-out process");
            if timeout(GRACEFUL_SHUTDOWN_TIMEOUT, child.wait()).await.is_ok() {
                return;
            }
            warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill timed-out process");
    }
}
