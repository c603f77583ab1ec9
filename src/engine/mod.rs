// src/engine/mod.rs

//! The rebuild loop.
//!
//! [`Orchestrator`] drives Build → Start → WaitForChange → Kill on a single
//! task. [`CycleGate`] is the one piece it shares with the signal listener:
//! shutdown closes the gate so no new cycle begins.

pub mod gate;
pub mod orchestrator;

pub use gate::CycleGate;
pub use orchestrator::Orchestrator;

/// Published by the orchestrator as it moves through a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Building,
    /// The build failed, or it succeeded and the artifact could not start.
    BuildFailed,
    Running,
}

/// What a single attempt tells the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Wait for the next change.
    Continue,
    /// The gate is closed; stop cycling.
    ShuttingDown,
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Exit with [`crate::errors::DevloopError::FirstBuildFailed`] when the
    /// very first attempt fails. Later failures never exit.
    pub fail_on_first_build_failure: bool,
    /// Arguments passed to every launch of the artifact.
    pub artifact_args: Vec<String>,
}
