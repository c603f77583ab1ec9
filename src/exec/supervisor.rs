// src/exec/supervisor.rs

//! Single-owner supervisor for the running artifact.
//!
//! One Tokio task owns the (at most one) live child. Start, Kill and status
//! queries arrive as messages on a channel, and exit notices from the child's
//! waiter arrive on a second channel, so none of these ever interleave.
//! Everyone else holds a cloneable [`SupervisorHandle`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::{DevloopError, Result};
use crate::exec::child::{launch, ChildExit, ExitNotice, RunningChild};
use crate::exec::output::OutputSink;

pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of the supervised process, as published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Terminating,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub sink: OutputSink,
    /// Time between SIGTERM and SIGKILL when stopping.
    pub kill_grace: Duration,
    /// Extra environment for the program (from env files).
    pub env: Vec<(String, String)>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            sink: OutputSink::default(),
            kill_grace: DEFAULT_KILL_GRACE,
            env: Vec::new(),
        }
    }
}

enum Request {
    Start {
        program: PathBuf,
        args: Vec<String>,
        reply: oneshot::Sender<Result<u32>>,
    },
    Kill {
        reply: oneshot::Sender<Result<()>>,
    },
    RunningPid {
        reply: oneshot::Sender<Option<u32>>,
    },
}

/// Capability to start/kill the supervised process.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Request>,
    state_rx: watch::Receiver<ProcessState>,
}

impl SupervisorHandle {
    /// Launch `program`, stopping any live process first. Returns the pid
    /// once the process is spawned; does not wait for it to do anything.
    pub async fn start(&self, program: &Path, args: &[String]) -> Result<u32> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Start {
            program: program.to_path_buf(),
            args: args.to_vec(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| supervisor_gone())?
    }

    /// Stop the live process and wait until it has exited.
    ///
    /// Idempotent: with nothing running (or a supervisor that has already
    /// shut down) this returns `Ok(())` immediately.
    pub async fn kill(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.send(Request::Kill { reply }).await.is_err() {
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    pub async fn running_pid(&self) -> Option<u32> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::RunningPid { reply }).await.ok()?;
        rx.await.ok().flatten()
    }

    pub async fn is_running(&self) -> bool {
        self.running_pid().await.is_some()
    }

    /// Latest published state, without a round-trip to the supervisor.
    pub fn state(&self) -> ProcessState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state_rx.clone()
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.tx.send(request).await.map_err(|_| supervisor_gone())
    }
}

fn supervisor_gone() -> DevloopError {
    DevloopError::Other(anyhow!("process supervisor has stopped"))
}

/// Owner of the live child. Runs as its own task; see [`ProcessSupervisor::spawn`].
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    active: Option<RunningChild>,
    generation: u64,
    state_tx: watch::Sender<ProcessState>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
    last_exit: Option<ChildExit>,
}

impl ProcessSupervisor {
    /// Spawn the supervisor task and return a handle to it.
    ///
    /// The task ends (stopping any live process) once every handle is
    /// dropped.
    pub fn spawn(config: SupervisorConfig) -> SupervisorHandle {
        let (tx, rx) = mpsc::channel::<Request>(32);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel::<ExitNotice>();
        let (state_tx, state_rx) = watch::channel(ProcessState::NotStarted);

        let supervisor = ProcessSupervisor {
            config,
            active: None,
            generation: 0,
            state_tx,
            exit_tx,
            last_exit: None,
        };
        tokio::spawn(supervisor.run(rx, exit_rx));

        SupervisorHandle { tx, state_rx }
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Request>,
        mut exit_rx: mpsc::UnboundedReceiver<ExitNotice>,
    ) {
        debug!("process supervisor started");

        loop {
            tokio::select! {
                request = rx.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
                Some(notice) = exit_rx.recv() => self.on_exit(notice).await,
            }
        }

        if let Err(e) = self.stop_active().await {
            warn!(error = %e, "failed to stop program while shutting down supervisor");
        }
        debug!(last_exit = ?self.last_exit, "process supervisor finished");
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::Start {
                program,
                args,
                reply,
            } => {
                let result = self.start(&program, &args).await;
                let _ = reply.send(result);
            }
            Request::Kill { reply } => {
                let result = self.stop_active().await;
                let _ = reply.send(result);
            }
            Request::RunningPid { reply } => {
                let _ = reply.send(self.active.as_ref().map(|c| c.pid));
            }
        }
    }

    async fn start(&mut self, program: &Path, args: &[String]) -> Result<u32> {
        if self.active.is_some() {
            warn!("start requested while a program is live; stopping it first");
            if let Err(e) = self.stop_active().await {
                warn!(error = %e, "failed to stop previous program; starting anyway");
            }
        }

        self.generation += 1;
        let child = launch(
            program,
            args,
            &self.config.env,
            &self.config.sink,
            self.config.kill_grace,
            self.generation,
            self.exit_tx.clone(),
        )?;

        let pid = child.pid;
        self.active = Some(child);
        self.state_tx.send_replace(ProcessState::Running);
        Ok(pid)
    }

    /// Stop whatever is live. No-op when nothing is.
    async fn stop_active(&mut self) -> Result<()> {
        let Some(child) = self.active.take() else {
            return Ok(());
        };

        self.state_tx.send_replace(ProcessState::Terminating);
        let pid = child.pid;
        let result = child.stop().await;
        // Even on failure the handle is gone; carry on as if it exited.
        self.state_tx.send_replace(ProcessState::Terminated);

        match result {
            Ok(exit) => {
                debug!(pid, exit_code = ?exit.code, stopped = exit.stopped, "program gone");
                self.last_exit = Some(exit);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn on_exit(&mut self, notice: ExitNotice) {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|c| c.generation == notice.generation);
        if !is_current {
            debug!(
                generation = notice.generation,
                pid = notice.exit.pid,
                "ignoring exit of a process that was already stopped"
            );
            return;
        }

        if let Some(child) = self.active.take() {
            info!(
                pid = child.pid,
                program = ?child.program,
                exit_code = ?notice.exit.code,
                "supervised program exited on its own"
            );
            // The waiter already finished; this only joins it.
            if let Err(e) = child.reap().await {
                debug!(error = %e, "joining exited waiter failed");
            }
        }
        self.last_exit = Some(notice.exit);
        self.state_tx.send_replace(ProcessState::Terminated);
    }
}
