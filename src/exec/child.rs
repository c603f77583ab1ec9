// src/exec/child.rs

//! A single supervised child process and its exit waiter.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{DevloopError, Result};
use crate::exec::output::OutputSink;

/// How a child went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildExit {
    pub pid: u32,
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
    /// True when the exit was requested by the supervisor.
    pub stopped: bool,
}

/// Sent by the waiter when a child exits without being asked to.
#[derive(Debug)]
pub(crate) struct ExitNotice {
    pub generation: u64,
    pub exit: ChildExit,
}

/// Internal handle for the currently-running child.
///
/// - `stop` asks the waiter to terminate the process.
/// - `waiter` is the Tokio task owning the `Child`; it resolves once the
///   process has been reaped, whichever way it ended.
pub(crate) struct RunningChild {
    pub pid: u32,
    pub generation: u64,
    pub program: PathBuf,
    stop: Option<oneshot::Sender<()>>,
    waiter: JoinHandle<Result<ChildExit>>,
}

impl RunningChild {
    /// Terminate the process (if still alive) and wait until it is reaped.
    pub async fn stop(mut self) -> Result<ChildExit> {
        if let Some(stop) = self.stop.take() {
            if stop.send(()).is_err() {
                debug!(pid = self.pid, "process already exited before stop request");
            }
        }
        self.reap().await
    }

    /// Collect the waiter's result without requesting termination.
    pub async fn reap(self) -> Result<ChildExit> {
        match self.waiter.await {
            Ok(result) => result,
            Err(e) => Err(DevloopError::KillError(format!(
                "waiter for pid {} failed: {e}",
                self.pid
            ))),
        }
    }
}

/// Spawn `program` and hand its lifetime to a background waiter.
pub(crate) fn launch(
    program: &Path,
    args: &[String],
    env: &[(String, String)],
    sink: &OutputSink,
    kill_grace: Duration,
    generation: u64,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
) -> Result<RunningChild> {
    let (stdout, stderr) = sink.stdio();

    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| DevloopError::LaunchError {
        path: program.to_path_buf(),
        source,
    })?;

    let Some(pid) = child.id() else {
        return Err(DevloopError::LaunchError {
            path: program.to_path_buf(),
            source: std::io::Error::other("process exited before its pid could be read"),
        });
    };
    sink.attach(&mut child, pid);

    info!(pid, program = ?program, ?args, "program started");

    let (stop_tx, stop_rx) = oneshot::channel();
    let waiter = tokio::spawn(wait_for_exit(child, pid, generation, kill_grace, stop_rx, exit_tx));

    Ok(RunningChild {
        pid,
        generation,
        program: program.to_path_buf(),
        stop: Some(stop_tx),
        waiter,
    })
}

/// Either the process exits on its own, or a stop request arrives first.
///
/// Only the natural-exit path sends an [`ExitNotice`]; a stopped child is
/// reported through the waiter's return value alone, so the two paths can
/// never both record the same exit.
async fn wait_for_exit(
    mut child: Child,
    pid: u32,
    generation: u64,
    kill_grace: Duration,
    mut stop_rx: oneshot::Receiver<()>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
) -> Result<ChildExit> {
    tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(pid, error = %e, "waiting for program failed");
                    None
                }
            };
            info!(pid, exit_code = ?code, "program exited");

            let exit = ChildExit { pid, code, stopped: false };
            let _ = exit_tx.send(ExitNotice { generation, exit: exit.clone() });
            Ok(exit)
        }

        // A closed channel (supervisor gone) is treated as a stop request too.
        _ = &mut stop_rx => {
            let status = terminate(&mut child, pid, kill_grace).await?;
            info!(pid, exit_code = ?status.code(), "program stopped");
            Ok(ChildExit { pid, code: status.code(), stopped: true })
        }
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL. Returns once reaped.
async fn terminate(child: &mut Child, pid: u32, grace: Duration) -> Result<ExitStatus> {
    #[cfg(unix)]
    if !grace.is_zero() && send_sigterm(pid) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => return Ok(status),
            Ok(Err(e)) => warn!(pid, error = %e, "waiting after SIGTERM failed"),
            Err(_) => warn!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "program ignored SIGTERM; escalating to SIGKILL"
            ),
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    child
        .kill()
        .await
        .map_err(|e| DevloopError::KillError(format!("pid {pid}: {e}")))?;
    child
        .wait()
        .await
        .map_err(|e| DevloopError::KillError(format!("reaping pid {pid}: {e}")))
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) on a child we spawned and have not reaped yet, so the
    // pid cannot have been recycled.
    let rc = unsafe { libc::kill(raw, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "SIGTERM delivery failed");
    }
    rc == 0
}
