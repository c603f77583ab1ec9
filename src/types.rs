use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which change detector backs the rebuild loop.
///
/// - `Poll`: full tree scan every poll interval, comparing modification
///   times against the scan cursor (default).
/// - `Notify`: native filesystem notifications via `notify`, with the same
///   inclusion/exclusion rules applied to event paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherKind {
    #[default]
    Poll,
    Notify,
}

impl FromStr for WatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poll" => Ok(WatcherKind::Poll),
            "notify" => Ok(WatcherKind::Notify),
            other => Err(format!(
                "invalid watcher: {other} (expected \"poll\" or \"notify\")"
            )),
        }
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherKind::Poll => f.write_str("poll"),
            WatcherKind::Notify => f.write_str("notify"),
        }
    }
}

/// How the program is leaving, mapped to a process exit code by `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Normal termination (`env`, `version`, or the loop ended on its own).
    Graceful,
    /// A termination signal was handled; carries the signal name.
    Signalled(String),
}

impl Exit {
    pub fn code(&self) -> i32 {
        match self {
            Exit::Graceful => 0,
            Exit::Signalled(_) => 1,
        }
    }
}
