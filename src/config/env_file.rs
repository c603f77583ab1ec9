// src/config/env_file.rs

//! `.env` style files.
//!
//! Files are read in order and later entries override earlier ones. Each
//! value is expanded (`$VAR`, `${VAR}`) and then rendered as a template
//! (`{{ .Env.NAME }}`) against the process environment overlaid with what
//! has been loaded so far. Nothing is written back into the process
//! environment: the result is handed to child commands explicitly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::fs::FileSystem;

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("variable pattern is valid")
});

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.Env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("template pattern is valid")
});

/// One assignment of a key, as seen in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    /// Value as written in the file.
    pub form: String,
    /// Value after expansion and template rendering.
    pub value: String,
    pub file: PathBuf,
}

/// Every key loaded from env files, with its assignment history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSet {
    order: Vec<String>,
    vars: HashMap<String, Vec<EnvVar>>,
}

impl EnvSet {
    /// Load `files` in order. `base` is the environment values may refer to
    /// (normally `std::env::vars()`).
    ///
    /// Unreadable files are logged and skipped.
    pub fn load<I>(fs: &dyn FileSystem, files: &[PathBuf], base: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut scope: HashMap<String, String> = base.into_iter().collect();
        let mut set = EnvSet::default();

        for file in files {
            match fs.read_to_string(file) {
                Ok(contents) => set.load_str(&contents, file, &mut scope),
                Err(e) => warn!(file = %file.display(), error = %e, "skipping env file"),
            }
        }

        set
    }

    /// Parse one file's contents, extending `scope` with each new value.
    pub fn load_str(&mut self, contents: &str, file: &Path, scope: &mut HashMap<String, String>) {
        for line in contents.lines() {
            let Some((key, form)) = parse_line(line) else {
                continue;
            };

            let expanded = expand_vars(&form, scope);
            let value = render_template(&key, &expanded, scope);
            debug!(key = %key, file = %file.display(), "env entry loaded");

            scope.insert(key.clone(), value.clone());
            self.push(
                key,
                EnvVar {
                    form,
                    value,
                    file: file.to_path_buf(),
                },
            );
        }
    }

    fn push(&mut self, key: String, var: EnvVar) {
        match self.vars.get_mut(&key) {
            Some(history) => history.push(var),
            None => {
                self.order.push(key.clone());
                self.vars.insert(key, vec![var]);
            }
        }
    }

    /// Current (last assigned) value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .and_then(|h| h.last())
            .map(|v| v.value.as_str())
    }

    pub fn history(&self, key: &str) -> &[EnvVar] {
        self.vars.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(key, current value)` in first-seen order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|k| self.get(k).map(|v| (k.clone(), v.to_string())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Split a line into key and raw value.
///
/// Text after `#` is a comment, unless the line contains `\#`: then every
/// `\#` becomes a literal `#` and nothing is stripped.
fn parse_line(line: &str) -> Option<(String, String)> {
    let body = if line.contains("\\#") {
        line.replace("\\#", "#")
    } else {
        line.split('#').next().unwrap_or_default().to_string()
    };

    let (key, value) = body.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

fn expand_vars(value: &str, scope: &HashMap<String, String>) -> String {
    VAR_RE
        .replace_all(value, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            scope.get(name).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn render_template(key: &str, value: &str, scope: &HashMap<String, String>) -> String {
    let rendered = TEMPLATE_RE
        .replace_all(value, |caps: &Captures<'_>| {
            scope.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned();

    if rendered.contains("{{") {
        warn!(key, value, "unsupported template syntax in env value; keeping it unrendered");
        return value.to_string();
    }
    rendered
}
