// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process runner: spawn an external tool, capture its output, and enforce a
// deadline with SIGTERM, a grace period, then SIGKILL.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, instrument, warn};

use printdesk_core::error::{PrintdeskError, Result};

use crate::job::{CommandSpec, JobOutput};

/// Default wait between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Anything that can execute a `CommandSpec`.
///
/// Higher layers depend on this trait so tests can swap in
/// [`ScriptedRunner`](crate::stub::ScriptedRunner).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Fails only when the program cannot be started or
    /// the deadline passes; a non-zero exit is reported in the output.
    async fn execute(&self, spec: &CommandSpec) -> Result<JobOutput>;

    /// Like [`execute`](Self::execute), but a non-zero exit becomes
    /// `ProcessNonZeroExit`.
    async fn run(&self, spec: &CommandSpec) -> Result<JobOutput> {
        let output = self.execute(spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(PrintdeskError::ProcessNonZeroExit {
                description: spec.description.clone(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs commands as real child processes on the tokio runtime.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace: Duration,
}

impl ProcessRunner {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Ask the child to stop, give it `grace` to comply, then kill it.
    async fn terminate(&self, child: &mut Child, spec: &CommandSpec) {
        if send_sigterm(child) {
            match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(job = %spec.id, ?status, "child exited after SIGTERM");
                    return;
                }
                Ok(Err(e)) => warn!(job = %spec.id, error = %e, "wait after SIGTERM failed"),
                Err(_) => warn!(
                    job = %spec.id,
                    grace_ms = self.grace.as_millis() as u64,
                    "child ignored SIGTERM, killing"
                ),
            }
        }
        if let Err(e) = child.kill().await {
            error!(job = %spec.id, error = %e, "failed to kill timed-out child");
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    #[instrument(skip_all, fields(job = %spec.id, program = %spec.program))]
    async fn execute(&self, spec: &CommandSpec) -> Result<JobOutput> {
        info!(
            description = %spec.description,
            argv = %spec.argv(),
            timeout_secs = spec.timeout.as_secs_f32(),
            "running external command"
        );
        let started = Instant::now();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| {
            error!(description = %spec.description, error = %source, "failed to spawn");
            PrintdeskError::ProcessSpawn {
                program: spec.program.clone(),
                description: spec.description.clone(),
                source,
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Pipes are drained alongside the wait so a chatty child cannot block
        // on a full pipe.
        let waited = tokio::time::timeout(spec.timeout, async {
            let (status, out, err) = tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
            status.map(|status| (status, out, err))
        })
        .await;

        match waited {
            Ok(Ok((status, out, err))) => {
                let output = JobOutput {
                    stdout: String::from_utf8_lossy(&out).into_owned(),
                    stderr: String::from_utf8_lossy(&err).into_owned(),
                    exit_code: status.code(),
                    elapsed: started.elapsed(),
                };
                if output.success() {
                    debug!(elapsed_ms = output.elapsed.as_millis() as u64, "command finished");
                } else {
                    warn!(
                        description = %spec.description,
                        exit_code = ?output.exit_code,
                        stderr = %output.stderr.trim(),
                        elapsed_ms = output.elapsed.as_millis() as u64,
                        "command exited unsuccessfully"
                    );
                }
                Ok(output)
            }
            Ok(Err(e)) => {
                error!(description = %spec.description, error = %e, "failed to wait for child");
                Err(PrintdeskError::Io(e))
            }
            Err(_) => {
                warn!(
                    description = %spec.description,
                    timeout_secs = spec.timeout.as_secs_f32(),
                    "command timed out, terminating"
                );
                self.terminate(&mut child, spec).await;
                Err(PrintdeskError::ProcessTimeout {
                    description: spec.description.clone(),
                    timeout: spec.timeout,
                })
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!(error = %e, "pipe read failed");
        }
    }
    buf
}

/// Returns true when SIGTERM was delivered.
#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: `pid` is our own child and has not been reaped (`id()` returns
    // `None` after that), so it cannot refer to an unrelated process.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}
