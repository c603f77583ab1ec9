// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The watch root is unusable, or the watcher backend failed.
    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Build failed: {0}")]
    BuildError(String),

    #[error("Failed to launch {}: {source}", path.display())]
    LaunchError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to kill supervised process: {0}")]
    KillError(String),

    /// `--fail-1st` was set and the very first build/run attempt failed.
    #[error("first build attempt failed")]
    FirstBuildFailed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevloopError>;
