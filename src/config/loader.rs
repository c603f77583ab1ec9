// src/config/loader.rs

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cli::GlobalArgs;
use crate::config::env_file::EnvSet;
use crate::config::model::{
    FileSettings, RawSettings, Settings, DEFAULT_BIN, DEFAULT_BUILD_PROGRAM, DEFAULT_ENV_FILE,
    DEFAULT_EXTENSION, DEFAULT_KILL_GRACE_MS, DEFAULT_LOG_PREFIX, DEFAULT_PATH,
    DEFAULT_POLL_INTERVAL_MS,
};
use crate::config::validate::resolve_against;
use crate::errors::{DevloopError, Result};
use crate::fs::RealFileSystem;

/// `Devloop.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Devloop.toml")
}

/// Read a config file. Only TOML deserialization happens here.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<FileSettings> {
    let contents = fs::read_to_string(path.as_ref())?;
    let settings: FileSettings = toml::from_str(&contents)?;
    Ok(settings)
}

/// Locate and read the config file for `args`.
///
/// An explicit `--config` that does not exist is an error; a missing default
/// file is simply skipped.
pub fn load_file_settings(args: &GlobalArgs) -> Result<Option<FileSettings>> {
    let (path, explicit) = match &args.config {
        Some(p) => (PathBuf::from(p), true),
        None => (default_config_path(), false),
    };

    if !path.exists() {
        if explicit {
            return Err(DevloopError::ConfigError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        debug!(path = %path.display(), "no config file; using flags and defaults");
        return Ok(None);
    }

    debug!(path = %path.display(), "loading config file");
    load_from_path(&path).map(Some)
}

/// Merge CLI/env values over file values over defaults.
///
/// `color_capable` is whether stdout can show colour at all; `--no-color`
/// or `no_color = true` turns it off regardless.
pub fn merge(
    args: &GlobalArgs,
    file: Option<FileSettings>,
    work_dir: PathBuf,
    color_capable: bool,
) -> RawSettings {
    let file = file.unwrap_or_default();

    RawSettings {
        work_dir,
        bin: args
            .bin
            .clone()
            .or(file.bin)
            .unwrap_or_else(|| DEFAULT_BIN.to_string()),
        path: args
            .path
            .clone()
            .or(file.path)
            .unwrap_or_else(|| DEFAULT_PATH.to_string()),
        build: args.build.clone().or(file.build),
        exclude_dir: non_empty(&args.exclude_dir)
            .or(file.exclude_dir)
            .unwrap_or_default(),
        all: args.all || file.all.unwrap_or(false),
        build_args: non_empty(&args.build_args)
            .or(file.build_args)
            .unwrap_or_default(),
        log_prefix: args
            .log_prefix
            .clone()
            .or(file.log_prefix)
            .unwrap_or_else(|| DEFAULT_LOG_PREFIX.to_string()),
        env_file: non_empty(&args.env_file)
            .or(file.env_file)
            .unwrap_or_else(|| vec![DEFAULT_ENV_FILE.to_string()]),
        gomod_vendor: args.gomod_vendor || file.gomod_vendor.unwrap_or(false),
        fail_first: args.fail_first || file.fail_first.unwrap_or(false),
        extension: file
            .extension
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        build_program: file
            .build_program
            .unwrap_or_else(|| DEFAULT_BUILD_PROGRAM.to_string()),
        poll_interval_ms: args
            .poll_interval_ms
            .or(file.poll_interval_ms)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        kill_grace_ms: args
            .kill_grace_ms
            .or(file.kill_grace_ms)
            .unwrap_or(DEFAULT_KILL_GRACE_MS),
        watcher: args.watcher.or(file.watcher).unwrap_or_default(),
        color: color_capable && !args.no_color && !file.no_color.unwrap_or(false),
    }
}

/// Everything `run`/`env` need: config file, merge, validation.
pub fn load_settings(args: &GlobalArgs) -> Result<Settings> {
    let file = load_file_settings(args)?;
    let work_dir = std::env::current_dir()?;
    let raw = merge(args, file, work_dir, std::io::stdout().is_terminal());
    Settings::try_from(raw)
}

/// Settings plus env files, with `DEVLOOP_*` keys from the env files
/// filling in flags that neither the command line nor the process
/// environment set.
///
/// The env files themselves are located from a first pass over `args`, so
/// `DEVLOOP_PATH` and `DEVLOOP_ENV_FILE` are not read from them.
pub fn load_settings_and_env(args: &GlobalArgs) -> Result<(Settings, EnvSet)> {
    let env = load_env_files(args)?;
    let args = apply_env_flags(args, &env);
    let settings = load_settings(&args)?;
    Ok((settings, env))
}

/// Read the env files named by `args` (or the config file, or the default)
/// against the process environment.
pub fn load_env_files(args: &GlobalArgs) -> Result<EnvSet> {
    let file = load_file_settings(args)?;
    let raw = merge(args, file, std::env::current_dir()?, false);
    let root = PathBuf::from(&raw.path);
    let files: Vec<PathBuf> = raw
        .env_file
        .iter()
        .filter(|f| !f.is_empty())
        .map(|f| resolve_against(&root, f))
        .collect();
    Ok(EnvSet::load(&RealFileSystem, &files, std::env::vars()))
}

/// Copy of `args` with unset flags taken from `DEVLOOP_*` env-file keys.
pub fn apply_env_flags(args: &GlobalArgs, env: &EnvSet) -> GlobalArgs {
    let mut args = args.clone();

    fill_string(&mut args.bin, env, "DEVLOOP_BIN");
    fill_string(&mut args.build, env, "DEVLOOP_BUILD");
    fill_string(&mut args.log_prefix, env, "DEVLOOP_LOG_PREFIX");
    fill_list(&mut args.exclude_dir, env, "DEVLOOP_EXCLUDE_DIR");
    fill_list(&mut args.build_args, env, "DEVLOOP_BUILD_ARGS");
    fill_flag(&mut args.all, env, "DEVLOOP_ALL");
    fill_flag(&mut args.gomod_vendor, env, "DEVLOOP_GOMOD_VENDOR");
    fill_flag(&mut args.fail_first, env, "DEVLOOP_FAIL_1ST");

    args
}

fn fill_string(slot: &mut Option<String>, env: &EnvSet, key: &str) {
    if slot.is_none() {
        if let Some(value) = env.get(key).filter(|v| !v.is_empty()) {
            debug!(key, "flag taken from env file");
            *slot = Some(value.to_string());
        }
    }
}

fn fill_list(slot: &mut Vec<String>, env: &EnvSet, key: &str) {
    if !slot.is_empty() {
        return;
    }
    if let Some(value) = env.get(key) {
        *slot = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        debug!(key, count = slot.len(), "flag taken from env file");
    }
}

fn fill_flag(slot: &mut bool, env: &EnvSet, key: &str) {
    if *slot {
        return;
    }
    let Some(value) = env.get(key) else {
        return;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => {
            debug!(key, "flag taken from env file");
            *slot = true;
        }
        "" | "0" | "false" | "no" | "off" => {}
        other => warn!(key, value = %other, "ignoring non-boolean env file value"),
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}
