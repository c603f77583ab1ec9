use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devloop::build::{BuildInvoker, BuildResult};
use devloop::exec::SupervisorHandle;

/// What the fake saw when a build started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCall {
    /// 1-based attempt number.
    pub attempt: usize,
    /// Whether the supervisor still had a live process at that moment.
    pub live_process: bool,
}

/// A build invoker that:
/// - returns scripted outcomes (`true` = success), then `fallback`
/// - always "produces" the same artifact path
/// - records every call, optionally probing the supervisor first
pub struct FakeBuildInvoker {
    outcomes: VecDeque<bool>,
    fallback: bool,
    artifact: PathBuf,
    delay: Duration,
    supervisor: Option<SupervisorHandle>,
    calls: Arc<Mutex<Vec<BuildCall>>>,
}

impl FakeBuildInvoker {
    pub fn new(artifact: impl Into<PathBuf>, outcomes: &[bool]) -> Self {
        Self {
            outcomes: outcomes.iter().copied().collect(),
            fallback: true,
            artifact: artifact.into(),
            delay: Duration::ZERO,
            supervisor: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Outcome once the scripted ones are used up.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Make every build take this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record whether `supervisor` had a live process when each build began.
    pub fn observing(mut self, supervisor: SupervisorHandle) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Shared view of the recorded calls.
    pub fn calls(&self) -> Arc<Mutex<Vec<BuildCall>>> {
        Arc::clone(&self.calls)
    }
}

impl BuildInvoker for FakeBuildInvoker {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>> {
        let ok = self.outcomes.pop_front().unwrap_or(self.fallback);
        let artifact = self.artifact.clone();
        let delay = self.delay;
        let supervisor = self.supervisor.clone();
        let calls = Arc::clone(&self.calls);

        Box::pin(async move {
            let live_process = match &supervisor {
                Some(handle) => handle.is_running().await,
                None => false,
            };
            {
                let mut guard = calls.lock().unwrap();
                let attempt = guard.len() + 1;
                guard.push(BuildCall {
                    attempt,
                    live_process,
                });
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if ok {
                BuildResult::success(artifact)
            } else {
                BuildResult::failure(artifact, "main.go:1:1: scripted failure")
            }
        })
    }

    fn artifact(&self) -> &Path {
        &self.artifact
    }
}
