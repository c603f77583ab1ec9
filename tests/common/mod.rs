#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;

use devloop::exec::{OutputLine, OutputSink, ProcessSupervisor, SupervisorConfig, SupervisorHandle};

pub use devloop_test_utils::{init_tracing, with_timeout};

/// Programs are run as `/bin/sh <script> ...` so a freshly written script is
/// only ever read, never exec'd.
pub const SHELL: &str = "/bin/sh";

pub fn shell() -> PathBuf {
    PathBuf::from(SHELL)
}

/// Arguments for running `script` through the shell.
pub fn script_args(script: &Path, extra: &[&str]) -> Vec<String> {
    let mut args = vec![script.to_string_lossy().into_owned()];
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}

/// A supervisor whose program output is forwarded line by line.
pub fn line_supervisor(
    kill_grace: Duration,
    env: Vec<(String, String)>,
) -> (SupervisorHandle, mpsc::UnboundedReceiver<OutputLine>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = ProcessSupervisor::spawn(SupervisorConfig {
        sink: OutputSink::Lines(tx),
        kill_grace,
        env,
    });
    (handle, rx)
}

/// Receive lines until one equals `wanted`. Panics on timeout.
pub async fn expect_line(rx: &mut mpsc::UnboundedReceiver<OutputLine>, wanted: &str) -> OutputLine {
    with_timeout(async {
        loop {
            match rx.recv().await {
                Some(line) if line.line == wanted => return line,
                Some(_) => continue,
                None => panic!("output channel closed before {wanted:?}"),
            }
        }
    })
    .await
}
