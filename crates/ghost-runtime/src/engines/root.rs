//! Root engine: silent shell execution.
//!
//! Commands run through the platform shell with no window, no inherited
//! stdin, and a hard timeout. A timeout is not an error at the API level:
//! it comes back as a failed [`ExecResult`] with the timeout message in
//! `stderr`, matching what a caller would see from a command that printed
//! its own failure.

use ghost_kernel::Engine;
use std::any::Any;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Outcome of one silent execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl ExecResult {
    fn timed_out(secs: u64) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr: format!("command timed out after {secs}s"),
            code: -1,
        }
    }
}

/// Shell command execution with a per-invocation deadline.
pub struct RootEngine {
    timeout: Duration,
}

impl RootEngine {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs `cmd` through the platform shell, capturing output.
    ///
    /// Spawn failures (shell missing, resource limits) surface as a failed
    /// result rather than an error; the dispatch chain treats every exec
    /// outcome uniformly.
    pub async fn exec_silent(&self, cmd: &str) -> ExecResult {
        debug!(cmd, timeout_secs = self.timeout.as_secs(), "silent exec");

        let mut command = platform_shell(cmd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The output future is dropped on timeout; without this the
            // child would outlive the deadline it just missed.
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ExecResult {
                    ok: false,
                    stdout: String::new(),
                    stderr: format!("failed to spawn: {e}"),
                    code: -1,
                }
            }
            Err(_) => return ExecResult::timed_out(self.timeout.as_secs()),
        };

        ExecResult {
            ok: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One-line host description for `sysinfo`.
    #[must_use]
    pub fn system_info(&self) -> String {
        format!(
            "{} {} ({}) | exec timeout {}s",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::FAMILY,
            self.timeout.as_secs()
        )
    }
}

#[cfg(unix)]
fn platform_shell(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    command
}

#[cfg(windows)]
fn platform_shell(cmd: &str) -> Command {
    use std::os::windows::process::CommandExt;
    // CREATE_NO_WINDOW keeps background commands from flashing a console.
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd).creation_flags(CREATE_NO_WINDOW);
    command
}

impl Engine for RootEngine {
    fn name(&self) -> &str {
        "root"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
