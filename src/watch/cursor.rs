// src/watch/cursor.rs

use std::time::SystemTime;

/// Point in time after which a modification counts as new.
///
/// Starts at program start and moves to "now" every time a change is
/// reported, so files already accounted for do not re-trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    last_scan: SystemTime,
}

impl ScanCursor {
    pub fn now() -> Self {
        Self::at(SystemTime::now())
    }

    pub fn at(last_scan: SystemTime) -> Self {
        Self { last_scan }
    }

    /// Strictly-after comparison; equal timestamps are not a change.
    pub fn is_newer(&self, modified: SystemTime) -> bool {
        modified > self.last_scan
    }

    pub fn advance(&mut self) {
        self.last_scan = SystemTime::now();
    }
}
