// src/build/mod.rs

//! Build invocation.
//!
//! The orchestrator talks to a [`BuildInvoker`] instead of spawning the
//! compiler itself, so tests can script build outcomes while production code
//! uses [`CommandBuildInvoker`].

pub mod invoker;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub use invoker::{artifact_path, BuildRequest, CommandBuildInvoker};

/// Outcome of one build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub succeeded: bool,
    /// Combined compiler output (or the spawn error) for failed builds.
    pub diagnostics: String,
    pub artifact: PathBuf,
}

impl BuildResult {
    pub fn success(artifact: impl Into<PathBuf>) -> Self {
        Self {
            succeeded: true,
            diagnostics: String::new(),
            artifact: artifact.into(),
        }
    }

    pub fn failure(artifact: impl Into<PathBuf>, diagnostics: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            diagnostics: diagnostics.into(),
            artifact: artifact.into(),
        }
    }
}

/// Trait abstracting how the artifact gets built.
pub trait BuildInvoker: Send {
    /// Run one build to completion.
    fn build(&mut self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>>;

    /// Where the artifact lands on success.
    fn artifact(&self) -> &Path;
}
