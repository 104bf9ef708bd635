//! Headless batch execution of the authoring tool.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

use super::{Invocation, ToolRunner};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};

/// Bytes kept from the end of each captured stream.
pub const OUTPUT_TAIL_LIMIT: usize = 64 * 1024;

/// Runs invocations as blocking child processes.
///
/// Output of passing runs is discarded. On failure the last
/// `OUTPUT_TAIL_LIMIT` bytes of standard output are attached to the error;
/// standard error only when `capture_stderr` is set.
#[derive(Debug, Clone)]
pub struct ProcessDriver {
    timeout: Duration,
    capture_stderr: bool,
}

impl ProcessDriver {
    /// Driver with an explicit bound on each invocation.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            capture_stderr: false,
        }
    }

    /// Driver configured from the harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.timeout()).with_capture_stderr(config.capture_stderr)
    }

    /// Also capture standard error of failed runs.
    pub fn with_capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    async fn run(&self, invocation: &Invocation) -> HarnessResult<()> {
        tokio::fs::create_dir_all(&invocation.output_dir)
            .await
            .map_err(|e| HarnessError::io(&invocation.output_dir, e))?;

        debug!("Invoking: {}", invocation.command_line());

        let mut cmd = Command::new(&invocation.tool);
        cmd.args(invocation.argv())
            .envs(invocation.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.capture_stderr {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| HarnessError::ToolInvocationFailed {
            reason: format!("failed to spawn {}: {}", invocation.tool.display(), e),
            stdout: String::new(),
            stderr: None,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_tail(stdout), read_tail(stderr));
            status.map(|status| (status, stdout, stderr))
        };

        // On timeout the child is dropped on return, which kills it.
        let (status, stdout, stderr) = match timeout(self.timeout, finished).await {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                return Err(HarnessError::ToolInvocationFailed {
                    reason: format!("failed to wait for {}: {}", invocation.tool.display(), e),
                    stdout: String::new(),
                    stderr: None,
                })
            }
            Err(_) => {
                warn!(
                    "Tool timed out after {:?}, killed: {}",
                    self.timeout,
                    invocation.command_line()
                );
                return Err(HarnessError::ToolInvocationTimedOut {
                    after: self.timeout,
                });
            }
        };

        if status.success() {
            return Ok(());
        }

        Err(HarnessError::ToolInvocationFailed {
            reason: describe_status(&status),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: self
                .capture_stderr
                .then(|| String::from_utf8_lossy(&stderr).into_owned()),
        })
    }
}

/// Drain a pipe to its end, keeping only the last `OUTPUT_TAIL_LIMIT` bytes.
async fn read_tail<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let Some(mut pipe) = pipe else {
        return Vec::new();
    };
    let mut tail = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > OUTPUT_TAIL_LIMIT {
                    tail.drain(..tail.len() - OUTPUT_TAIL_LIMIT);
                }
            }
            Err(e) => {
                debug!("Stopped reading tool output: {}", e);
                break;
            }
        }
    }
    tail
}

#[async_trait]
impl ToolRunner for ProcessDriver {
    async fn execute(&self, invocation: &Invocation) -> HarnessResult<()> {
        self.run(invocation).await
    }
}

fn describe_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("killed by signal {}", signal);
        }
    }
    "terminated without exit status".to_string()
}
