// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::WatcherKind;

pub const DEFAULT_BIN: &str = ".devloop";
pub const DEFAULT_PATH: &str = ".";
pub const DEFAULT_LOG_PREFIX: &str = "devloop";
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_EXTENSION: &str = "go";
pub const DEFAULT_BUILD_PROGRAM: &str = "go";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_KILL_GRACE_MS: u64 = 5_000;

/// Contents of the optional `Devloop.toml`.
///
/// Every key is optional; anything left out falls through to the built-in
/// default. CLI flags and `DEVLOOP_*` variables take precedence over it.
///
/// ```toml
/// bin = ".devloop"
/// path = "."
/// exclude_dir = ["vendor", "web/node_modules"]
/// build_args = ["-race"]
/// fail_1st = true
/// watcher = "notify"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub bin: Option<String>,
    pub path: Option<String>,
    pub build: Option<String>,
    pub exclude_dir: Option<Vec<String>>,
    pub all: Option<bool>,
    pub build_args: Option<Vec<String>>,
    pub log_prefix: Option<String>,
    pub env_file: Option<Vec<String>>,
    pub gomod_vendor: Option<bool>,
    #[serde(rename = "fail_1st")]
    pub fail_first: Option<bool>,
    /// Source extension that counts as a change (without the dot).
    pub extension: Option<String>,
    /// Compiler executable; invoked as `<program> build -o <out> ...`.
    pub build_program: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub kill_grace_ms: Option<u64>,
    pub watcher: Option<WatcherKind>,
    pub no_color: Option<bool>,
}

/// Settings after merging all layers, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSettings {
    /// Working directory the artifact path is resolved against.
    pub work_dir: PathBuf,
    pub bin: String,
    pub path: String,
    pub build: Option<String>,
    pub exclude_dir: Vec<String>,
    pub all: bool,
    pub build_args: Vec<String>,
    pub log_prefix: String,
    pub env_file: Vec<String>,
    pub gomod_vendor: bool,
    pub fail_first: bool,
    pub extension: String,
    pub build_program: String,
    pub poll_interval_ms: u64,
    pub kill_grace_ms: u64,
    pub watcher: WatcherKind,
    pub color: bool,
}

/// Validated settings the rest of the program is built from.
///
/// Only constructed through `TryFrom<RawSettings>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub watch_root: PathBuf,
    pub build_dir: PathBuf,
    /// Absolute location of the built program.
    pub artifact: PathBuf,
    /// `artifact` relative to the watch root, when it is written inside it.
    pub artifact_in_tree: Option<String>,
    pub excluded: Vec<String>,
    pub include_all_extensions: bool,
    pub extension: String,
    pub build_program: String,
    pub build_args: Vec<String>,
    pub vendor_first: bool,
    pub log_prefix: String,
    /// Env files in load order, resolved against the watch root.
    pub env_files: Vec<PathBuf>,
    pub fail_first: bool,
    pub poll_interval: Duration,
    pub kill_grace: Duration,
    pub watcher: WatcherKind,
    pub color: bool,
}
