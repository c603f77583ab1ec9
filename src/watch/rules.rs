// src/watch/rules.rs

use std::fmt;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::errors::{DevloopError, Result};

/// Version-control metadata directories that are never descended into.
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn", ".bzr"];

/// Which filesystem entries under the watch root count as a "change".
///
/// Immutable once built. Paths handed to the matching helpers are relative
/// to the root and use `/` separators (see [`relative_to_root`]).
#[derive(Clone)]
pub struct WatchRule {
    root: PathBuf,
    excluded: Vec<String>,
    exclude_set: GlobSet,
    ignored_files: Vec<String>,
    include_all_extensions: bool,
    extension: String,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("root", &self.root)
            .field("excluded", &self.excluded)
            .field("ignored_files", &self.ignored_files)
            .field("include_all_extensions", &self.include_all_extensions)
            .field("extension", &self.extension)
            .finish()
    }
}

impl WatchRule {
    /// Compile a rule.
    ///
    /// `excluded` entries are directory paths relative to `root` (`vendor`,
    /// `./web/node_modules/`) or globs over such paths (`**/testdata`).
    pub fn new(
        root: impl Into<PathBuf>,
        excluded: &[String],
        include_all_extensions: bool,
        extension: impl Into<String>,
    ) -> Result<Self> {
        let mut normalized = Vec::with_capacity(excluded.len());
        let mut builder = GlobSetBuilder::new();

        for raw in excluded {
            let entry = normalize_rel(raw);
            if entry.is_empty() {
                warn!(entry = %raw, "ignoring exclude entry that names the watch root");
                continue;
            }
            let glob = Glob::new(&entry).map_err(|e| {
                DevloopError::ConfigError(format!("invalid exclude pattern {raw:?}: {e}"))
            })?;
            builder.add(glob);
            normalized.push(entry);
        }

        let exclude_set = builder
            .build()
            .map_err(|e| DevloopError::ConfigError(format!("building exclude set: {e}")))?;

        Ok(Self {
            root: root.into(),
            excluded: normalized,
            exclude_set,
            ignored_files: Vec::new(),
            include_all_extensions,
            extension: extension.into().trim_start_matches('.').to_string(),
        })
    }

    /// Never report the file at `rel_file` (relative to the root), whatever
    /// its extension. Used for the build output when it lands in the tree.
    pub fn ignoring_file(mut self, rel_file: &str) -> Self {
        let rel = normalize_rel(rel_file);
        if !rel.is_empty() && !self.ignored_files.contains(&rel) {
            self.ignored_files.push(rel);
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn include_all_extensions(&self) -> bool {
        self.include_all_extensions
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// True if the directory at `rel_dir` must not be descended into.
    ///
    /// The root itself (`""`) is never pruned.
    pub fn prunes_dir(&self, rel_dir: &str) -> bool {
        if rel_dir.is_empty() {
            return false;
        }
        let name = rel_dir.rsplit('/').next().unwrap_or(rel_dir);
        VCS_DIRS.contains(&name) || is_hidden(name) || self.exclude_set.is_match(rel_dir)
    }

    /// True if the file at `rel_file` can trigger a rebuild, judged on its own
    /// name only (ancestors are the traversal's business).
    pub fn accepts_file(&self, rel_file: &str) -> bool {
        let name = rel_file.rsplit('/').next().unwrap_or(rel_file);
        if name.is_empty() || is_hidden(name) {
            return false;
        }
        if self.ignored_files.iter().any(|f| f == rel_file) {
            return false;
        }
        if self.include_all_extensions {
            return true;
        }
        Path::new(name)
            .extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }

    /// Full check for a path seen outside a traversal (e.g. a notify event):
    /// every ancestor directory must be unpruned and the file itself accepted.
    pub fn accepts_path(&self, rel_file: &str) -> bool {
        let mut prefix = String::new();
        let mut parts = rel_file.split('/').peekable();

        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                break;
            }
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if self.prunes_dir(&prefix) {
                return false;
            }
        }

        self.accepts_file(rel_file)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

/// Normalise a user-supplied relative path: forward slashes, no leading
/// `./`, no trailing `/`.
fn normalize_rel(raw: &str) -> String {
    let mut s = raw.trim().replace('\\', "/");
    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    let s = s.trim_end_matches('/');
    if s == "." { String::new() } else { s.to_string() }
}

/// Express `path` relative to `root` with `/` separators.
///
/// Falls back to canonicalising both sides when a plain prefix strip fails
/// (symlinked temp dirs, `/private/var` on macOS). `None` when `path` is not
/// under `root`.
pub fn relative_to_root(root: &Path, path: &Path) -> Option<String> {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let root = root.canonicalize().ok()?;
            let path = path.canonicalize().ok()?;
            path.strip_prefix(&root).ok()?.to_path_buf()
        }
    };

    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(excluded: &[&str], all: bool) -> WatchRule {
        let excluded: Vec<String> = excluded.iter().map(|s| s.to_string()).collect();
        WatchRule::new("/proj", &excluded, all, "go").unwrap()
    }

    #[test]
    fn excluded_entries_are_normalized() {
        let r = rule(&["./vendor/", "web\\node_modules", "."], false);
        assert_eq!(r.excluded(), &["vendor".to_string(), "web/node_modules".to_string()]);
    }

    #[test]
    fn prunes_vcs_hidden_and_excluded_dirs() {
        let r = rule(&["vendor", "**/testdata"], false);
        assert!(r.prunes_dir(".git"));
        assert!(r.prunes_dir("sub/.hg"));
        assert!(r.prunes_dir(".cache"));
        assert!(r.prunes_dir("vendor"));
        assert!(r.prunes_dir("pkg/parser/testdata"));
        assert!(!r.prunes_dir("pkg"));
        assert!(!r.prunes_dir("vendored"));
        assert!(!r.prunes_dir(""));
    }

    #[test]
    fn excluded_path_only_matches_from_root() {
        let r = rule(&["vendor"], false);
        assert!(!r.prunes_dir("internal/vendor"));
    }

    #[test]
    fn extension_filter_respects_include_all() {
        let go_only = rule(&[], false);
        assert!(go_only.accepts_file("main.go"));
        assert!(go_only.accepts_file("pkg/util.go"));
        assert!(!go_only.accepts_file("notes.txt"));
        assert!(!go_only.accepts_file("Makefile"));

        let all = rule(&[], true);
        assert!(all.accepts_file("notes.txt"));
        assert!(all.accepts_file("Makefile"));
    }

    #[test]
    fn hidden_files_never_qualify() {
        let all = rule(&[], true);
        assert!(!all.accepts_file(".env"));
        assert!(!all.accepts_file("pkg/.main.go.swp"));
    }

    #[test]
    fn accepts_path_checks_every_ancestor() {
        let r = rule(&["vendor"], false);
        assert!(r.accepts_path("cmd/server/main.go"));
        assert!(!r.accepts_path("vendor/lib/lib.go"));
        assert!(!r.accepts_path(".git/hooks/x.go"));
        assert!(!r.accepts_path("a/.idea/b.go"));
    }

    #[test]
    fn leading_dot_on_extension_is_ignored() {
        let r = WatchRule::new("/proj", &[], false, ".rs").unwrap();
        assert_eq!(r.extension(), "rs");
        assert!(r.accepts_file("src/lib.rs"));
    }

    #[test]
    fn invalid_glob_is_a_config_error() {
        let err = WatchRule::new("/proj", &["a/[".to_string()], false, "go").unwrap_err();
        assert!(matches!(err, DevloopError::ConfigError(ref msg) if msg.contains("a/[")));
    }

    #[test]
    fn ignored_file_is_rejected_by_exact_path_only() {
        let r = rule(&[], true).ignoring_file("./bin/app");
        assert!(!r.accepts_file("bin/app"));
        assert!(!r.accepts_path("bin/app"));
        assert!(r.accepts_file("app"));
        assert!(r.accepts_file("bin/app.go"));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let rel = relative_to_root(Path::new("/proj"), Path::new("/proj/a/b/c.go"));
        assert_eq!(rel.as_deref(), Some("a/b/c.go"));
        assert_eq!(relative_to_root(Path::new("/proj"), Path::new("/proj")).as_deref(), Some(""));
        assert_eq!(relative_to_root(Path::new("/proj"), Path::new("/elsewhere/x.go")), None);
    }
}
