// src/exec/output.rs

//! Where the supervised program's stdout/stderr go.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of program output, as delivered to [`OutputSink::Lines`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub pid: u32,
    pub stream: Stream,
    pub line: String,
}

/// Output destination for supervised processes.
///
/// - `Inherit`: the program writes straight to our terminal, unbuffered.
/// - `Null`: output is discarded.
/// - `Lines`: both streams are read line by line and forwarded as they
///   arrive (used by tests and embedders).
#[derive(Debug, Clone)]
pub enum OutputSink {
    Inherit,
    Null,
    Lines(mpsc::UnboundedSender<OutputLine>),
}

impl Default for OutputSink {
    fn default() -> Self {
        OutputSink::Inherit
    }
}

impl OutputSink {
    /// Stdio handles for a child about to be spawned: (stdout, stderr).
    pub(crate) fn stdio(&self) -> (Stdio, Stdio) {
        match self {
            OutputSink::Inherit => (Stdio::inherit(), Stdio::inherit()),
            OutputSink::Null => (Stdio::null(), Stdio::null()),
            OutputSink::Lines(_) => (Stdio::piped(), Stdio::piped()),
        }
    }

    /// Start forwarding a freshly spawned child's pipes, if any.
    pub(crate) fn attach(&self, child: &mut Child, pid: u32) {
        let OutputSink::Lines(tx) = self else {
            return;
        };
        if let Some(stdout) = child.stdout.take() {
            spawn_forwarder(stdout, pid, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_forwarder(stderr, pid, Stream::Stderr, tx.clone());
        }
    }
}

fn spawn_forwarder<R>(reader: R, pid: u32, stream: Stream, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        // Keep draining even without a receiver so the child never blocks.
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = tx.send(OutputLine { pid, stream, line });
        }
        trace!(pid, ?stream, "output forwarder ended");
    });
}
