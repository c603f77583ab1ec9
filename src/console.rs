// src/console.rs

//! Operator-facing status lines.
//!
//! These are the short "Building..." / "Build failed" messages the person at
//! the terminal watches, as opposed to the `tracing` diagnostics on stderr.
//! The prefix and colour choice live here instead of in globals so each
//! orchestrator carries its own.

use std::fmt::Display;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use colored::Colorize;

#[derive(Debug, Clone)]
enum Target {
    Stdout,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

#[derive(Debug, Clone)]
pub struct Console {
    prefix: String,
    color: bool,
    target: Target,
}

impl Console {
    pub fn stdout(prefix: impl Into<String>, color: bool) -> Self {
        Self {
            prefix: prefix.into(),
            color,
            target: Target::Stdout,
        }
    }

    /// A console that writes into a shared buffer (no colour), for tests.
    pub fn buffered(prefix: impl Into<String>) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let console = Self {
            prefix: prefix.into(),
            color: false,
            target: Target::Buffer(Arc::clone(&buf)),
        };
        (console, buf)
    }

    pub fn building(&self) {
        self.status("Building...");
    }

    pub fn build_finished(&self) {
        let msg = if self.color {
            "Build finished".green().bold().to_string()
        } else {
            "Build finished".to_string()
        };
        self.status(msg);
    }

    /// Report a failed build followed by the compiler's diagnostics verbatim.
    pub fn build_failed(&self, diagnostics: &str) {
        self.status(self.failure("Build failed"));
        if !diagnostics.is_empty() {
            self.raw(diagnostics);
        }
    }

    pub fn launch_failed(&self, error: &dyn Display) {
        self.status(format!("{}: {error}", self.failure("Launch failed")));
    }

    pub fn change_detected(&self, path: &Path) {
        self.status(format!("Change detected: {}", path.display()));
    }

    fn failure(&self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn status(&self, msg: impl Display) {
        self.raw(&format!("[{}] {msg}", self.prefix));
    }

    fn raw(&self, text: &str) {
        match &self.target {
            Target::Stdout => {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{text}");
                let _ = out.flush();
            }
            Target::Buffer(buf) => {
                let mut buf = buf.lock().unwrap_or_else(|e| e.into_inner());
                let _ = writeln!(buf, "{text}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(buf: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buf.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn status_lines_carry_the_prefix() {
        let (console, buf) = Console::buffered("api");
        console.building();
        console.build_finished();
        assert_eq!(text(&buf), "[api] Building...\n[api] Build finished\n");
    }

    #[test]
    fn diagnostics_follow_the_failure_line() {
        let (console, buf) = Console::buffered("devloop");
        console.build_failed("main.go:3:2: undefined: x");
        assert_eq!(
            text(&buf),
            "[devloop] Build failed\nmain.go:3:2: undefined: x\n"
        );
    }
}
