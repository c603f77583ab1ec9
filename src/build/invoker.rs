// src/build/invoker.rs

//! External build command runner.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{BuildInvoker, BuildResult};

/// Everything needed to produce the artifact.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Directory the build command runs in.
    pub source_dir: PathBuf,
    /// Absolute path of the produced binary.
    pub output_path: PathBuf,
    /// Appended after `build -o <output>`.
    pub extra_args: Vec<String>,
    /// Run `<program> mod vendor` before each build.
    pub vendor_first: bool,
}

/// Resolve the artifact path for a binary name relative to `work_dir`.
///
/// On Windows `.exe` is appended when missing.
pub fn artifact_path(work_dir: &Path, bin: &str) -> PathBuf {
    let bin = if bin.is_empty() { "bin" } else { bin };
    if cfg!(windows) && !bin.ends_with(".exe") {
        work_dir.join(format!("{bin}.exe"))
    } else {
        work_dir.join(bin)
    }
}

/// Runs `<program> build -o <output> <extra args...>` in the source dir.
#[derive(Debug, Clone)]
pub struct CommandBuildInvoker {
    request: BuildRequest,
    program: String,
    env: Vec<(String, String)>,
}

impl CommandBuildInvoker {
    pub fn new(request: BuildRequest, program: impl Into<String>, env: Vec<(String, String)>) -> Self {
        Self {
            request,
            program: program.into(),
            env,
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.request.source_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-o".to_string(),
            self.request.output_path.to_string_lossy().into_owned(),
        ];
        args.extend(self.request.extra_args.iter().cloned());
        args
    }

    /// The vendoring step never fails the build; problems are only logged.
    async fn vendor(&self) {
        let args = vec!["mod".to_string(), "vendor".to_string()];
        info!(program = %self.program, dir = ?self.request.source_dir, "{} mod vendor", self.program);

        match self.command(&args).output().await {
            Ok(output) if output.status.success() => debug!("vendoring finished"),
            Ok(output) => warn!(
                exit_code = output.status.code().unwrap_or(-1),
                output = %combined_output(&output.stdout, &output.stderr),
                "vendoring was not successful"
            ),
            Err(e) => warn!(error = %e, "vendoring could not be started"),
        }
    }

    async fn run_build(&self) -> BuildResult {
        if self.request.vendor_first {
            self.vendor().await;
        }

        let args = self.build_args();
        debug!(program = %self.program, ?args, dir = ?self.request.source_dir, "running build command");

        let artifact = self.request.output_path.clone();
        match self.command(&args).output().await {
            Ok(output) if output.status.success() => BuildResult::success(artifact),
            Ok(output) => {
                let text = combined_output(&output.stdout, &output.stderr);
                warn!(
                    exit_code = output.status.code().unwrap_or(-1),
                    ?args,
                    "build command failed"
                );
                BuildResult::failure(artifact, format!("{text}\n{}", output.status))
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "build command could not be started");
                BuildResult::failure(artifact, format!("{}: {e}", self.program))
            }
        }
    }
}

impl BuildInvoker for CommandBuildInvoker {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>> {
        Box::pin(self.run_build())
    }

    fn artifact(&self) -> &Path {
        &self.request.output_path
    }
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(stderr));
    text.trim_end().to_string()
}
