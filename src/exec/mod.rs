// src/exec/mod.rs

//! Process supervision layer.
//!
//! - [`supervisor`] owns the single live artifact process behind a
//!   message-driven task and hands out [`SupervisorHandle`]s.
//! - [`child`] launches one process and watches it until it exits or is
//!   stopped (SIGTERM, grace period, SIGKILL).
//! - [`output`] decides where the program's stdout/stderr go.

pub mod child;
pub mod output;
pub mod supervisor;

pub use child::ChildExit;
pub use output::{OutputLine, OutputSink, Stream};
pub use supervisor::{
    ProcessState, ProcessSupervisor, SupervisorConfig, SupervisorHandle, DEFAULT_KILL_GRACE,
};
