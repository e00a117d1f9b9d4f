use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs an external tool from an argument vector (never through a shell) with
/// a wall-clock limit. On timeout or cancellation the tool's whole process
/// group is killed and reaped before returning.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(
        &self,
        args: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        if cancel.is_cancelled() {
            return Err(CommandError::Cancelled);
        }

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| CommandError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;
        let pid = child.id();
        tracing::debug!(program = %self.program.display(), pid, "External tool started");

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let finished = tokio::select! {
            status = child.wait() => Ok(status?),
            _ = tokio::time::sleep(self.timeout) => Err(CommandError::TimedOut(self.timeout)),
            _ = cancel.cancelled() => Err(CommandError::Cancelled),
        };

        match finished {
            Ok(status) => Ok(CommandOutput {
                code: status.code(),
                stdout: collect(stdout).await,
                stderr: collect(stderr).await,
            }),
            Err(e) => {
                tracing::warn!(
                    program = %self.program.display(),
                    pid,
                    reason = %e,
                    "Terminating external tool"
                );
                terminate(pid, &mut child).await;
                stdout.abort();
                stderr.abort();
                Err(e)
            }
        }
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// A grandchild may keep the pipe open after the tool exits; give up after a grace period.
async fn collect(reader: JoinHandle<String>) -> String {
    let abort = reader.abort_handle();
    match tokio::time::timeout(PIPE_DRAIN_GRACE, reader).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            abort.abort();
            String::new()
        }
    }
}

/// Kills the process group led by `pid`, then the child itself, and waits for it.
async fn terminate(pid: Option<u32>, child: &mut Child) {
    if let Some(pid) = pid.filter(|p| *p > 1) {
        kill_process_group(pid).await;
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "Child already exited");
    }
}

#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    let group = format!("-{}", pid);
    let signalled = Command::new("kill")
        .args(["-KILL", "--", group.as_str()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = signalled {
        tracing::warn!(pid, error = %e, "Failed to signal process group");
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: u32) {}
