// src/watch/mod.rs

//! Change detection for the rebuild loop.
//!
//! The orchestrator only sees the [`ChangeDetector`] trait. Two
//! implementations exist:
//! - [`poller::PollingDetector`]: full tree scan every interval, comparing
//!   modification times against a [`cursor::ScanCursor`] (default).
//! - [`notify_watcher::NotifyDetector`]: native filesystem notifications.
//!
//! Both apply the same [`rules::WatchRule`].

pub mod cursor;
pub mod notify_watcher;
pub mod poller;
pub mod rules;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;

pub use cursor::ScanCursor;
pub use notify_watcher::NotifyDetector;
pub use poller::PollingDetector;
pub use rules::{relative_to_root, WatchRule};

/// Something the orchestrator can block on until a source file changes.
pub trait ChangeDetector: Send {
    /// Resolve with the path of the first qualifying change.
    ///
    /// Changes that happen while nobody is waiting are picked up by the next
    /// call; several of them collapse into a single result.
    fn wait_for_change(&mut self) -> Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + '_>>;
}

impl<D: ChangeDetector + ?Sized> ChangeDetector for Box<D> {
    fn wait_for_change(&mut self) -> Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + '_>> {
        (**self).wait_for_change()
    }
}
