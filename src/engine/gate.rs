// src/engine/gate.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// Serialises the build+start section of a cycle against shutdown.
///
/// The orchestrator holds the gate from the start of a build until the new
/// process is launched (or the attempt failed). Shutdown closes the gate:
/// no new cycle may begin, a build in flight runs to completion but its
/// artifact is not started, and the closer gets the lock once that cycle is
/// done.
#[derive(Debug, Clone, Default)]
pub struct CycleGate {
    inner: Arc<GateInner>,
}

#[derive(Debug, Default)]
struct GateInner {
    closing: AtomicBool,
    lock: Mutex<()>,
}

impl CycleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a cycle. `None` once the gate has been closed.
    pub async fn enter(&self) -> Option<MutexGuard<'_, ()>> {
        if self.is_closing() {
            return None;
        }
        let guard = self.inner.lock.lock().await;
        if self.is_closing() {
            return None;
        }
        Some(guard)
    }

    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }

    /// Refuse new cycles and wait for the current one to finish.
    pub async fn close(&self) -> MutexGuard<'_, ()> {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.lock.lock().await
    }
}
