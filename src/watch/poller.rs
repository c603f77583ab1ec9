// src/watch/poller.rs

//! Interval-based change detection.
//!
//! Every pass walks the whole tree depth-first in lexical order and stops at
//! the first accepted file whose modification time is after the cursor. If
//! nothing qualifies the detector sleeps for one interval and walks again, so
//! any number of edits inside one interval produce a single trigger.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::errors::{DevloopError, Result};
use crate::fs::FileSystem;
use crate::watch::cursor::ScanCursor;
use crate::watch::rules::WatchRule;
use crate::watch::ChangeDetector;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct PollingDetector {
    fs: Arc<dyn FileSystem>,
    rule: WatchRule,
    cursor: ScanCursor,
    interval: Duration,
    root_missing: bool,
}

impl PollingDetector {
    /// Build a detector, failing fast when the watch root is not a directory.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        rule: WatchRule,
        cursor: ScanCursor,
        interval: Duration,
    ) -> Result<Self> {
        if !fs.is_dir(rule.root()) {
            return Err(DevloopError::WatchError(format!(
                "watch root {:?} does not exist or is not a directory",
                rule.root()
            )));
        }

        Ok(Self {
            fs,
            rule,
            cursor,
            interval,
            root_missing: false,
        })
    }

    /// Run a single pass. On a hit the cursor moves to now.
    pub fn scan_once(&mut self) -> Option<PathBuf> {
        let hit = find_change(self.fs.as_ref(), &self.rule, &self.cursor);
        if hit.is_some() {
            self.cursor.advance();
        }
        hit
    }

    /// Log (once per transition) when the root disappears or comes back.
    fn check_root(&mut self) {
        let present = self.fs.is_dir(self.rule.root());
        if !present && !self.root_missing {
            warn!(root = ?self.rule.root(), "watch root is no longer a directory; waiting for it to return");
        } else if present && self.root_missing {
            info!(root = ?self.rule.root(), "watch root is back");
        }
        self.root_missing = !present;
    }
}

impl ChangeDetector for PollingDetector {
    fn wait_for_change(&mut self) -> Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + '_>> {
        Box::pin(async move {
            loop {
                self.check_root();

                let fs = Arc::clone(&self.fs);
                let rule = self.rule.clone();
                let cursor = self.cursor;
                let hit = tokio::task::spawn_blocking(move || find_change(fs.as_ref(), &rule, &cursor))
                    .await
                    .map_err(|e| DevloopError::WatchError(format!("scan task failed: {e}")))?;

                if let Some(path) = hit {
                    self.cursor.advance();
                    debug!(?path, "change detected");
                    return Ok(path);
                }

                sleep(self.interval).await;
            }
        })
    }
}

/// One full depth-first pass. Returns the first changed file, if any.
///
/// Unreadable entries are skipped.
pub fn find_change(fs: &dyn FileSystem, rule: &WatchRule, cursor: &ScanCursor) -> Option<PathBuf> {
    let root = rule.root();
    let mut stack: Vec<(PathBuf, String)> = Vec::new();
    push_children(fs, root, "", &mut stack);

    while let Some((path, rel)) = stack.pop() {
        let is_dir = fs.is_dir(&path);
        if is_dir && fs.is_symlink(&path) {
            trace!(dir = %rel, "not following symlinked dir");
            continue;
        }
        if is_dir {
            if rule.prunes_dir(&rel) {
                trace!(dir = %rel, "pruned");
                continue;
            }
            push_children(fs, &path, &rel, &mut stack);
            continue;
        }

        if !rule.accepts_file(&rel) {
            continue;
        }

        match fs.modified(&path) {
            Ok(modified) if cursor.is_newer(modified) => return Some(path),
            Ok(_) => {}
            Err(e) => trace!(file = %rel, error = %e, "skipping unreadable entry"),
        }
    }

    None
}

/// Push a directory's children so that they pop in lexical order.
fn push_children(fs: &dyn FileSystem, dir: &Path, rel_dir: &str, stack: &mut Vec<(PathBuf, String)>) {
    let mut children = match fs.read_dir(dir) {
        Ok(children) => children,
        Err(e) => {
            trace!(dir = ?dir, error = %e, "skipping unreadable directory");
            return;
        }
    };
    children.sort();

    for child in children.into_iter().rev() {
        let Some(name) = child.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let rel = if rel_dir.is_empty() {
            name
        } else {
            format!("{rel_dir}/{name}")
        };
        stack.push((child, rel));
    }
}
