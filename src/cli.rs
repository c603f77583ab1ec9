// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every global flag can also be supplied through a `DEVLOOP_*` environment
//! variable (clap's `env` feature). Values left unset here fall through to the
//! optional TOML config file and then to built-in defaults; see
//! [`crate::config::loader::load_settings`].

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::WatcherKind;

/// Command-line arguments for `devloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devloop",
    version,
    about = "Rebuild and restart a program whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build, run, and rebuild/restart on every source change.
    Run {
        /// Arguments passed to the built program.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
        args: Vec<String>,
    },
    /// Print the variables loaded from env files and the resolved settings.
    Env,
    /// Print version information.
    Version,
}

/// Flags shared by all subcommands.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Name of the generated binary file (default `.devloop`).
    #[arg(long, short = 'b', env = "DEVLOOP_BIN", global = true)]
    pub bin: Option<String>,

    /// Path to watch for changes (default `.`).
    #[arg(long, short = 't', env = "DEVLOOP_PATH", global = true)]
    pub path: Option<String>,

    /// Directory the build command runs in (defaults to `--path`).
    #[arg(long, short = 'd', env = "DEVLOOP_BUILD", global = true)]
    pub build: Option<String>,

    /// Relative directories (or globs) to exclude from watching.
    #[arg(
        long = "exclude-dir",
        short = 'x',
        env = "DEVLOOP_EXCLUDE_DIR",
        value_delimiter = ',',
        global = true
    )]
    pub exclude_dir: Vec<String>,

    /// Rebuild whenever any file changes, not only source files.
    #[arg(long, short = 'a', env = "DEVLOOP_ALL", global = true)]
    pub all: bool,

    /// Additional arguments for the build command.
    #[arg(
        long = "build-arg",
        short = 'r',
        env = "DEVLOOP_BUILD_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true,
        global = true
    )]
    pub build_args: Vec<String>,

    /// Prefix for operator status lines (default `devloop`).
    #[arg(long, env = "DEVLOOP_LOG_PREFIX", global = true)]
    pub log_prefix: Option<String>,

    /// Env files to read; later files take precedence (default `.env`).
    #[arg(long = "env-file", env = "DEVLOOP_ENV_FILE", value_delimiter = ',', global = true)]
    pub env_file: Vec<String>,

    /// Run `go mod vendor` before every build.
    #[arg(long, env = "DEVLOOP_GOMOD_VENDOR", global = true)]
    pub gomod_vendor: bool,

    /// Exit with an error if the first build (or launch) fails.
    #[arg(long = "fail-1st", env = "DEVLOOP_FAIL_1ST", global = true)]
    pub fail_first: bool,

    /// Path to an optional TOML config file.
    ///
    /// Default: `Devloop.toml` in the current working directory; skipped when
    /// it does not exist.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Disable coloured status lines.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Interval between polling scans, in milliseconds (default 500).
    #[arg(long, value_name = "MS", global = true)]
    pub poll_interval_ms: Option<u64>,

    /// Time a stopping program gets before it is force-killed, in
    /// milliseconds (default 5000).
    #[arg(long, value_name = "MS", global = true)]
    pub kill_grace_ms: Option<u64>,

    /// Change detector: `poll` (default) or `notify`.
    #[arg(long, value_name = "KIND", global = true)]
    pub watcher: Option<WatcherKind>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
