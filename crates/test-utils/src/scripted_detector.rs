use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::mpsc;

use devloop::errors::Result;
use devloop::watch::ChangeDetector;

/// A change detector driven by the test.
///
/// Every path sent on the paired sender is one "change". Once the sender is
/// dropped the detector waits forever, like a tree nobody edits.
pub struct ScriptedDetector {
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl ScriptedDetector {
    pub fn new() -> (Self, mpsc::UnboundedSender<PathBuf>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }
}

impl ChangeDetector for ScriptedDetector {
    fn wait_for_change(&mut self) -> Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + '_>> {
        Box::pin(async move {
            match self.rx.recv().await {
                Some(path) => Ok(path),
                None => std::future::pending().await,
            }
        })
    }
}
