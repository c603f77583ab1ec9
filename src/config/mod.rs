// src/config/mod.rs

//! Settings: CLI flags and `DEVLOOP_*` variables over `Devloop.toml` over
//! defaults, plus the env files handed to the build and the program.

pub mod env_file;
pub mod loader;
pub mod model;
pub mod validate;

pub use env_file::{EnvSet, EnvVar};
pub use loader::{
    apply_env_flags, default_config_path, load_env_files, load_file_settings, load_settings,
    load_settings_and_env, merge,
};
pub use model::{FileSettings, RawSettings, Settings};
