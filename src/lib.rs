// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod signals;
pub mod types;
pub mod watch;

use std::sync::Arc;

use tracing::{info, warn};

use crate::build::{BuildRequest, CommandBuildInvoker};
use crate::cli::{CliArgs, Command};
use crate::config::{load_settings_and_env, EnvSet, Settings};
use crate::console::Console;
use crate::engine::{CycleGate, Orchestrator, OrchestratorOptions};
use crate::errors::Result;
use crate::exec::{OutputSink, ProcessSupervisor, SupervisorConfig};
use crate::fs::RealFileSystem;
use crate::signals::ShutdownHandler;
use crate::types::{Exit, WatcherKind};
use crate::watch::{ChangeDetector, NotifyDetector, PollingDetector, ScanCursor};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<Exit> {
    match args.command {
        Command::Version => {
            print_version();
            Ok(Exit::Graceful)
        }
        Command::Env => {
            let (settings, env) = load_settings_and_env(&args.global)?;
            print_env(&env, &settings);
            Ok(Exit::Graceful)
        }
        Command::Run { args: program_args } => {
            let (settings, env) = load_settings_and_env(&args.global)?;
            supervise(settings, env, program_args).await
        }
    }
}

/// Wire up and run the rebuild loop until a signal or the first-build
/// policy ends it.
///
/// - the supervisor actor owns the running program
/// - the signal listener shares only the supervisor handle and the gate
/// - the orchestrator runs on its own task
pub async fn supervise(settings: Settings, env: EnvSet, artifact_args: Vec<String>) -> Result<Exit> {
    // Anything modified after this instant counts as a change.
    let cursor = ScanCursor::now();
    let env_pairs = env.pairs();

    let supervisor = ProcessSupervisor::spawn(SupervisorConfig {
        sink: OutputSink::Inherit,
        kill_grace: settings.kill_grace,
        env: env_pairs.clone(),
    });

    let gate = CycleGate::new();
    let mut listener = signals::spawn_listener(ShutdownHandler::new(supervisor.clone(), gate.clone()));

    let builder = CommandBuildInvoker::new(
        BuildRequest {
            source_dir: settings.build_dir.clone(),
            output_path: settings.artifact.clone(),
            extra_args: settings.build_args.clone(),
            vendor_first: settings.vendor_first,
        },
        settings.build_program.clone(),
        env_pairs,
    );
    let detector = make_detector(&settings, cursor)?;
    let console = Console::stdout(settings.log_prefix.clone(), settings.color);

    info!(
        root = %settings.watch_root.display(),
        artifact = %settings.artifact.display(),
        watcher = %settings.watcher,
        "devloop starting"
    );

    let orchestrator = Orchestrator::new(
        builder,
        detector,
        supervisor.clone(),
        console,
        OrchestratorOptions {
            fail_on_first_build_failure: settings.fail_first,
            artifact_args,
        },
        gate.clone(),
    );
    let mut rebuild_loop = tokio::spawn(orchestrator.run());

    tokio::select! {
        handled = &mut listener => {
            rebuild_loop.abort();
            Ok(handled.map_err(anyhow::Error::from)?)
        }
        finished = &mut rebuild_loop => {
            let outcome = finished.map_err(anyhow::Error::from)?;
            if gate.is_closing() {
                // The loop saw the closed gate first; let the handler finish.
                return Ok((&mut listener).await.map_err(anyhow::Error::from)?);
            }
            listener.abort();
            if let Err(e) = supervisor.kill().await {
                warn!(error = %e, "failed to stop program on exit");
            }
            outcome.map(|()| Exit::Graceful)
        }
    }
}

fn make_detector(settings: &Settings, cursor: ScanCursor) -> Result<Box<dyn ChangeDetector>> {
    let rule = settings.watch_rule()?;
    let detector: Box<dyn ChangeDetector> = match settings.watcher {
        WatcherKind::Poll => Box::new(PollingDetector::new(
            Arc::new(RealFileSystem),
            rule,
            cursor,
            settings.poll_interval,
        )?),
        WatcherKind::Notify => Box::new(NotifyDetector::spawn(rule, settings.poll_interval)?),
    };
    Ok(detector)
}

fn print_env(env: &EnvSet, settings: &Settings) {
    println!("# env");
    for (key, value) in env.pairs() {
        println!("{key}={value}");
    }
    println!("# ---");
    println!("{settings:#?}");
}

fn print_version() {
    println!(
        "version\t{}\ncommit\t{}\ndate\t{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("DEVLOOP_COMMIT").unwrap_or("dev"),
        option_env!("DEVLOOP_DATE").unwrap_or("dev"),
    );
}
