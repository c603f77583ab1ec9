// tests/orchestrator_cycles.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, line_supervisor, script_args, shell, with_timeout};

use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use devloop::console::Console;
use devloop::engine::{CycleGate, LoopState, Orchestrator, OrchestratorOptions};
use devloop::errors::DevloopError;
use devloop::exec::{ProcessState, SupervisorHandle};
use devloop::signals::ShutdownHandler;
use devloop::types::Exit;
use devloop_test_utils::{write_script, BuildCall, FakeBuildInvoker, ScriptedDetector, StateRecorder};

type TestResult = Result<(), Box<dyn Error>>;

const APP: &str = "trap 'exit 0' TERM\necho up\nwhile true; do sleep 0.05; done\n";

struct Harness {
    supervisor: SupervisorHandle,
    gate: CycleGate,
    states: watch::Receiver<LoopState>,
    calls: Arc<Mutex<Vec<BuildCall>>>,
    console_buf: Arc<Mutex<Vec<u8>>>,
    changes: tokio::sync::mpsc::UnboundedSender<PathBuf>,
    orchestrator: Option<Orchestrator<FakeBuildInvoker, ScriptedDetector>>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(outcomes: &[bool], fail_first: bool, delay: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "app.sh", APP);
        let (supervisor, _lines) = line_supervisor(Duration::from_secs(5), vec![]);

        let builder = FakeBuildInvoker::new(shell(), outcomes)
            .with_delay(delay)
            .observing(supervisor.clone());
        let calls = builder.calls();
        let (detector, changes) = ScriptedDetector::new();
        let (console, console_buf) = Console::buffered("devloop");
        let gate = CycleGate::new();

        let orchestrator = Orchestrator::new(
            builder,
            detector,
            supervisor.clone(),
            console,
            OrchestratorOptions {
                fail_on_first_build_failure: fail_first,
                artifact_args: script_args(&script, &[]),
            },
            gate.clone(),
        );
        let states = orchestrator.states();

        Self {
            supervisor,
            gate,
            states,
            calls,
            console_buf,
            changes,
            orchestrator: Some(orchestrator),
            _dir: dir,
        }
    }

    fn spawn(&mut self) -> tokio::task::JoinHandle<devloop::errors::Result<()>> {
        let orchestrator = self.orchestrator.take().expect("already spawned");
        tokio::spawn(orchestrator.run())
    }

    async fn reach(&mut self, wanted: LoopState) {
        with_timeout(self.states.wait_for(|s| *s == wanted))
            .await
            .expect("orchestrator dropped");
    }

    async fn reach_attempt(&mut self, attempt: usize, wanted: LoopState) {
        with_timeout(async {
            loop {
                if self.calls.lock().unwrap().len() >= attempt && *self.states.borrow() == wanted {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
    }

    fn console_text(&self) -> String {
        String::from_utf8(self.console_buf.lock().unwrap().clone()).unwrap()
    }
}

#[tokio::test]
async fn change_kills_then_rebuilds_then_restarts() -> TestResult {
    init_tracing();
    let mut h = Harness::new(&[true, true], false, Duration::ZERO);
    let task = h.spawn();

    h.reach(LoopState::Running).await;
    let first = h.supervisor.running_pid().await.expect("first program running");

    h.changes.send(PathBuf::from("main.go"))?;
    h.reach_attempt(2, LoopState::Running).await;
    let second = h.supervisor.running_pid().await.expect("second program running");
    assert_ne!(first, second);

    // The old process was gone before the second build began.
    let calls = h.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            BuildCall { attempt: 1, live_process: false },
            BuildCall { attempt: 2, live_process: false },
        ]
    );

    let text = h.console_text();
    assert_eq!(text.matches("[devloop] Building...").count(), 2);
    assert!(text.contains("[devloop] Change detected: main.go"));

    task.abort();
    h.supervisor.kill().await?;
    Ok(())
}

#[tokio::test]
async fn failed_build_waits_for_the_next_change() -> TestResult {
    init_tracing();
    let mut h = Harness::new(&[false, true], false, Duration::ZERO);
    let task = h.spawn();

    h.reach(LoopState::BuildFailed).await;
    assert!(!h.supervisor.is_running().await);
    assert!(!task.is_finished());

    let text = h.console_text();
    assert!(text.contains("[devloop] Build failed\nmain.go:1:1: scripted failure\n"));

    h.changes.send(PathBuf::from("main.go"))?;
    h.reach(LoopState::Running).await;
    assert!(h.supervisor.is_running().await);

    task.abort();
    h.supervisor.kill().await?;
    Ok(())
}

#[tokio::test]
async fn first_failure_ends_the_loop_when_requested() -> TestResult {
    init_tracing();
    let mut h = Harness::new(&[false], true, Duration::ZERO);
    let task = h.spawn();

    let result = with_timeout(task).await?;
    assert!(matches!(result, Err(DevloopError::FirstBuildFailed)));
    assert!(!h.supervisor.is_running().await);
    assert_eq!(h.calls.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn later_failures_do_not_end_the_loop() -> TestResult {
    init_tracing();
    let mut h = Harness::new(&[true, false], true, Duration::ZERO);
    let task = h.spawn();

    h.reach(LoopState::Running).await;
    h.changes.send(PathBuf::from("main.go"))?;
    h.reach_attempt(2, LoopState::BuildFailed).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());
    assert!(!h.supervisor.is_running().await);

    task.abort();
    Ok(())
}

#[tokio::test]
async fn signal_during_build_waits_and_nothing_is_started() -> TestResult {
    init_tracing();
    let mut h = Harness::new(&[true], false, Duration::from_millis(300));
    let recorder = StateRecorder::attach(&h.supervisor);
    let task = h.spawn();

    h.reach(LoopState::Building).await;
    let handler = ShutdownHandler::new(h.supervisor.clone(), h.gate.clone());
    let exit = with_timeout(handler.shutdown("SIGINT")).await;
    assert_eq!(exit, Exit::Signalled("SIGINT".to_string()));

    // The build ran to completion, then the loop stopped without a launch.
    assert_eq!(h.calls.lock().unwrap().len(), 1);
    let result = with_timeout(task).await?;
    assert!(result.is_ok());
    assert!(!h.supervisor.is_running().await);
    assert!(!recorder.states().contains(&ProcessState::Running));
    Ok(())
}

#[tokio::test]
async fn signal_while_running_kills_the_program() -> TestResult {
    init_tracing();
    let mut h = Harness::new(&[true], false, Duration::ZERO);
    let task = h.spawn();

    h.reach(LoopState::Running).await;
    assert!(h.supervisor.is_running().await);

    let handler = ShutdownHandler::new(h.supervisor.clone(), h.gate.clone());
    let exit = with_timeout(handler.shutdown("SIGTERM")).await;

    assert_eq!(exit.code(), 1);
    assert!(!h.supervisor.is_running().await);
    assert_eq!(h.supervisor.state(), ProcessState::Terminated);

    // A change after shutdown does not start another cycle.
    h.changes.send(PathBuf::from("main.go"))?;
    let result = with_timeout(task).await?;
    assert!(result.is_ok());
    assert_eq!(h.calls.lock().unwrap().len(), 1);
    Ok(())
}
