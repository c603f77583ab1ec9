// src/engine/orchestrator.rs

use std::fmt;
use std::path::Path;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::build::BuildInvoker;
use crate::console::Console;
use crate::errors::{DevloopError, Result};
use crate::exec::SupervisorHandle;
use crate::watch::ChangeDetector;

use super::{CycleGate, CycleOutcome, LoopState, OrchestratorOptions};

/// The rebuild loop: build, start, wait for a change, kill, repeat.
///
/// Every step runs on this one task, so the kill of the old process always
/// finishes before the next build starts, and that build finishes before the
/// new process is started.
pub struct Orchestrator<B: BuildInvoker, D: ChangeDetector> {
    builder: B,
    detector: D,
    supervisor: SupervisorHandle,
    console: Console,
    options: OrchestratorOptions,
    gate: CycleGate,
    attempts: u64,
    state_tx: watch::Sender<LoopState>,
}

impl<B: BuildInvoker, D: ChangeDetector> fmt::Debug for Orchestrator<B, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .field("attempts", &self.attempts)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl<B: BuildInvoker, D: ChangeDetector> Orchestrator<B, D> {
    pub fn new(
        builder: B,
        detector: D,
        supervisor: SupervisorHandle,
        console: Console,
        options: OrchestratorOptions,
        gate: CycleGate,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Idle);
        Self {
            builder,
            detector,
            supervisor,
            console,
            options,
            gate,
            attempts: 0,
            state_tx,
        }
    }

    /// Observe loop state transitions.
    pub fn states(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    /// Build/run attempts made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Run until shutdown closes the gate, the first-attempt policy fires, or
    /// the change detector fails.
    pub async fn run(mut self) -> Result<()> {
        info!(
            fail_on_first = self.options.fail_on_first_build_failure,
            "rebuild loop started"
        );

        loop {
            if self.attempt().await? == CycleOutcome::ShuttingDown {
                info!("shutdown in progress; rebuild loop stopping");
                return Ok(());
            }

            let changed = self.detector.wait_for_change().await?;
            info!(path = %changed.display(), "change detected");
            self.console.change_detected(&changed);

            if let Err(e) = self.supervisor.kill().await {
                warn!(error = %e, "failed to stop previous program; rebuilding anyway");
            }
            self.set_state(LoopState::Idle);
        }
    }

    /// One Building → (Running | BuildFailed) step, guarded by the cycle gate.
    pub async fn attempt(&mut self) -> Result<CycleOutcome> {
        let Some(_cycle) = self.gate.enter().await else {
            return Ok(CycleOutcome::ShuttingDown);
        };

        let first = self.attempts == 0;
        self.attempts += 1;

        self.set_state(LoopState::Building);
        self.console.building();
        let result = self.builder.build().await;

        let started = if result.succeeded {
            self.console.build_finished();
            if self.gate.is_closing() {
                debug!("build finished after shutdown began; not starting it");
                return Ok(CycleOutcome::ShuttingDown);
            }
            Self::launch(
                &self.supervisor,
                &self.console,
                &self.options.artifact_args,
                &result.artifact,
            )
            .await
        } else {
            let err = DevloopError::BuildError(format!(
                "{} ({} bytes of diagnostics)",
                result.artifact.display(),
                result.diagnostics.len()
            ));
            warn!(attempt = self.attempts, error = %err, "build failed");
            self.console.build_failed(&result.diagnostics);
            false
        };

        if started {
            self.set_state(LoopState::Running);
            return Ok(CycleOutcome::Continue);
        }

        self.set_state(LoopState::BuildFailed);
        if first && self.options.fail_on_first_build_failure {
            error!("first build attempt failed; exiting");
            return Err(DevloopError::FirstBuildFailed);
        }
        Ok(CycleOutcome::Continue)
    }

    /// Borrows fields, not `&self`: builders and detectors need not be `Sync`.
    async fn launch(
        supervisor: &SupervisorHandle,
        console: &Console,
        args: &[String],
        artifact: &Path,
    ) -> bool {
        match supervisor.start(artifact, args).await {
            Ok(pid) => {
                debug!(pid, "artifact running");
                true
            }
            Err(e) => {
                error!(error = %e, "could not start the built program");
                console.launch_failed(&e);
                false
            }
        }
    }

    fn set_state(&self, state: LoopState) {
        self.state_tx.send_replace(state);
    }
}
