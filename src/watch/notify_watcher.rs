// src/watch/notify_watcher.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::errors::{DevloopError, Result};
use crate::watch::rules::{relative_to_root, WatchRule};
use crate::watch::ChangeDetector;

/// Change detector backed by native filesystem notifications.
///
/// Event paths go through the same [`WatchRule`] as the poller. Once a
/// qualifying path arrives, further events are drained for one `settle`
/// interval so that a burst of writes yields a single trigger.
pub struct NotifyDetector {
    rule: WatchRule,
    settle: Duration,
    event_rx: mpsc::UnboundedReceiver<Event>,
    // Dropping the watcher stops event delivery.
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for NotifyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyDetector")
            .field("rule", &self.rule)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl NotifyDetector {
    /// Start watching `rule.root()` recursively.
    pub fn spawn(rule: WatchRule, settle: Duration) -> Result<Self> {
        if !rule.root().is_dir() {
            return Err(DevloopError::WatchError(format!(
                "watch root {:?} does not exist or is not a directory",
                rule.root()
            )));
        }

        // Channel from the blocking notify callback into the async world.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    // Receiver gone means the detector was dropped.
                    let _ = event_tx.send(event);
                }
                Err(err) => warn!(error = %err, "file watch error"),
            },
            Config::default(),
        )
        .map_err(|e| DevloopError::WatchError(format!("creating watcher: {e}")))?;

        watcher
            .watch(rule.root(), RecursiveMode::Recursive)
            .map_err(|e| DevloopError::WatchError(format!("watching {:?}: {e}", rule.root())))?;

        info!(root = ?rule.root(), "notify watcher started");

        Ok(Self {
            rule,
            settle,
            event_rx,
            _watcher: watcher,
        })
    }

    fn qualifying_path(&self, event: &Event) -> Option<PathBuf> {
        if matches!(event.kind, EventKind::Access(_)) {
            return None;
        }
        event.paths.iter().find_map(|path| {
            let rel = relative_to_root(self.rule.root(), path)?;
            if self.rule.accepts_path(&rel) {
                Some(path.clone())
            } else {
                trace!(path = %rel, "ignoring event path");
                None
            }
        })
    }
}

impl ChangeDetector for NotifyDetector {
    fn wait_for_change(&mut self) -> Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + '_>> {
        Box::pin(async move {
            let changed = loop {
                let event = self.event_rx.recv().await.ok_or_else(|| {
                    DevloopError::WatchError("notify event channel closed".to_string())
                })?;
                if let Some(path) = self.qualifying_path(&event) {
                    break path;
                }
            };

            sleep(self.settle).await;
            let mut dropped = 0usize;
            while self.event_rx.try_recv().is_ok() {
                dropped += 1;
            }
            debug!(path = ?changed, dropped, "change detected");

            Ok(changed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind};

    fn detector_for(root: &std::path::Path) -> NotifyDetector {
        let rule = WatchRule::new(root, &["vendor".to_string()], false, "go").unwrap();
        NotifyDetector::spawn(rule, Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn event_paths_are_filtered_by_rule() {
        let dir = tempfile::tempdir().unwrap();
        let d = detector_for(dir.path());

        let create = |p: &str| Event::new(EventKind::Create(CreateKind::File)).add_path(dir.path().join(p));

        assert!(d.qualifying_path(&create("main.go")).is_some());
        assert!(d.qualifying_path(&create("vendor/x/x.go")).is_none());
        assert!(d.qualifying_path(&create("notes.txt")).is_none());
        assert!(d.qualifying_path(&create(".main.go.swp")).is_none());

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(dir.path().join("main.go"));
        assert!(d.qualifying_path(&access).is_none());
    }

    #[test]
    fn missing_root_fails_to_spawn() {
        let rule = WatchRule::new("/definitely/not/here", &[], false, "go").unwrap();
        assert!(matches!(
            NotifyDetector::spawn(rule, Duration::from_millis(10)),
            Err(DevloopError::WatchError(_))
        ));
    }
}
