// src/signals.rs

//! Termination-signal handling.
//!
//! On Unix SIGINT and SIGTERM are handled (plus [`tokio::signal::ctrl_c`]);
//! elsewhere only Ctrl-C. The listener is installed once at startup and runs
//! beside the orchestrator for the rest of the program.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::CycleGate;
use crate::exec::SupervisorHandle;
use crate::types::Exit;

/// Resolve with the name of the first termination signal received.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<String> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    Ok(name.to_string())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<String> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C".to_string())
}

/// Best-effort teardown run when a termination signal arrives.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    supervisor: SupervisorHandle,
    gate: CycleGate,
}

impl ShutdownHandler {
    pub fn new(supervisor: SupervisorHandle, gate: CycleGate) -> Self {
        Self { supervisor, gate }
    }

    /// Stop new cycles, wait out a build in flight, kill the program.
    ///
    /// Kill failures are logged and not retried; the outcome is always
    /// [`Exit::Signalled`].
    pub async fn shutdown(&self, signal: &str) -> Exit {
        info!(signal, "termination signal received; shutting down");

        let _cycle = self.gate.close().await;
        if let Err(e) = self.supervisor.kill().await {
            warn!(error = %e, "failed to stop program during shutdown");
        }

        Exit::Signalled(signal.to_string())
    }
}

/// Install the signal listener. The returned task resolves once a signal has
/// been handled.
///
/// If the platform refuses to install the handlers the failure is logged and
/// the task never resolves, leaving the orchestrator to decide when to exit.
pub fn spawn_listener(handler: ShutdownHandler) -> JoinHandle<Exit> {
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(name) => handler.shutdown(&name).await,
            Err(e) => {
                warn!(error = %e, "could not install termination signal handlers");
                std::future::pending().await
            }
        }
    })
}
