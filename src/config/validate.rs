// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::build::artifact_path;
use crate::config::model::{RawSettings, Settings};
use crate::errors::{DevloopError, Result};
use crate::watch::rules::relative_to_root;
use crate::watch::WatchRule;

impl TryFrom<RawSettings> for Settings {
    type Error = DevloopError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        if raw.poll_interval_ms == 0 {
            return Err(DevloopError::ConfigError(
                "poll interval must be >= 1ms (got 0)".to_string(),
            ));
        }

        let extension = normalize_extension(&raw.extension)?;

        let watch_root = PathBuf::from(&raw.path);
        if !watch_root.is_dir() {
            return Err(DevloopError::WatchError(format!(
                "watch root {} does not exist or is not a directory",
                watch_root.display()
            )));
        }

        // Compiled once here so a bad pattern fails at startup.
        WatchRule::new(&watch_root, &raw.exclude_dir, raw.all, extension.clone())?;

        let build_dir = raw
            .build
            .as_deref()
            .filter(|b| !b.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| watch_root.clone());

        let env_files = raw
            .env_file
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| resolve_against(&watch_root, f))
            .collect();

        let artifact = artifact_path(&raw.work_dir, &raw.bin);
        let artifact_in_tree = path_in_tree(&raw.work_dir.join(&watch_root), &artifact);

        Ok(Settings {
            artifact,
            artifact_in_tree,
            watch_root,
            build_dir,
            excluded: raw.exclude_dir,
            include_all_extensions: raw.all,
            extension,
            build_program: raw.build_program,
            build_args: raw.build_args,
            vendor_first: raw.gomod_vendor,
            log_prefix: raw.log_prefix,
            env_files,
            fail_first: raw.fail_first,
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
            kill_grace: Duration::from_millis(raw.kill_grace_ms),
            watcher: raw.watcher,
            color: raw.color,
        })
    }
}

impl Settings {
    /// The inclusion/exclusion rule both detectors apply.
    pub fn watch_rule(&self) -> Result<WatchRule> {
        let rule = WatchRule::new(
            &self.watch_root,
            &self.excluded,
            self.include_all_extensions,
            self.extension.clone(),
        )?;
        // Each build rewrites the artifact; it must not trigger the next one.
        Ok(match &self.artifact_in_tree {
            Some(rel) => rule.ignoring_file(rel),
            None => rule,
        })
    }
}

fn normalize_extension(raw: &str) -> Result<String> {
    let ext = raw.trim().trim_start_matches('.');
    if ext.is_empty() {
        return Err(DevloopError::ConfigError(
            "source extension must not be empty".to_string(),
        ));
    }
    Ok(ext.to_string())
}

/// `file` relative to `root`, or `None` when it lies outside.
///
/// `file` need not exist yet, so only its parent is resolved.
fn path_in_tree(root: &Path, file: &Path) -> Option<String> {
    let name = file.file_name()?.to_string_lossy().into_owned();
    let parent = file.parent()?;
    let rel_parent = relative_to_root(root, parent)?;
    if rel_parent.is_empty() {
        Some(name)
    } else {
        Some(format!("{rel_parent}/{name}"))
    }
}

pub(crate) fn resolve_against(root: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WatcherKind;

    fn raw(path: &Path) -> RawSettings {
        RawSettings {
            work_dir: PathBuf::from("/work"),
            bin: ".devloop".into(),
            path: path.to_string_lossy().into_owned(),
            build: None,
            exclude_dir: vec![],
            all: false,
            build_args: vec![],
            log_prefix: "devloop".into(),
            env_file: vec![".env".into()],
            gomod_vendor: false,
            fail_first: false,
            extension: "go".into(),
            build_program: "go".into(),
            poll_interval_ms: 500,
            kill_grace_ms: 5_000,
            watcher: WatcherKind::Poll,
            color: false,
        }
    }

    #[test]
    fn valid_settings_resolve_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = raw(dir.path());
        r.env_file = vec![".env".into(), "/etc/devloop.env".into()];

        let s = Settings::try_from(r).unwrap();

        assert_eq!(s.watch_root, dir.path());
        assert_eq!(s.build_dir, dir.path());
        assert_eq!(
            s.env_files,
            vec![dir.path().join(".env"), PathBuf::from("/etc/devloop.env")]
        );
        assert!(s.artifact.starts_with("/work"));
        assert_eq!(s.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = raw(dir.path());
        r.poll_interval_ms = 0;
        assert!(matches!(
            Settings::try_from(r),
            Err(DevloopError::ConfigError(_))
        ));
    }

    #[test]
    fn leading_dot_is_stripped_from_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = raw(dir.path());
        r.extension = ".rs".into();
        assert_eq!(Settings::try_from(r).unwrap().extension, "rs");

        let mut r = raw(dir.path());
        r.extension = ".".into();
        assert!(Settings::try_from(r).is_err());
    }

    #[test]
    fn missing_watch_root_is_a_watch_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = raw(&dir.path().join("nope"));
        assert!(matches!(
            Settings::try_from(r),
            Err(DevloopError::WatchError(_))
        ));
    }

    #[test]
    fn bad_exclude_glob_fails_early() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = raw(dir.path());
        r.exclude_dir = vec!["src/[".into()];
        assert!(matches!(
            Settings::try_from(r),
            Err(DevloopError::ConfigError(_))
        ));
    }

    #[test]
    fn artifact_inside_the_watch_root_is_never_watched() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = raw(dir.path());
        r.work_dir = dir.path().to_path_buf();
        r.bin = "app".into();
        r.all = true;

        let s = Settings::try_from(r).unwrap();
        assert_eq!(s.artifact_in_tree.as_deref(), Some("app"));

        let rule = s.watch_rule().unwrap();
        assert!(!rule.accepts_file("app"));
        assert!(rule.accepts_file("main.go"));
    }

    #[test]
    fn artifact_outside_the_watch_root_is_left_alone() {
        let work = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let mut r = raw(src.path());
        r.work_dir = work.path().to_path_buf();
        r.bin = "app".into();

        let s = Settings::try_from(r).unwrap();
        assert_eq!(s.artifact_in_tree, None);
    }
}
