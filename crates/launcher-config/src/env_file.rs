//! Environment file loading.
//!
//! Accepts `KEY=VALUE` lines with an optional `export ` prefix, `#` comments
//! and single- or double-quoted values. Variables already set in the process
//! environment win over the file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

/// Parsed environment file.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    path: PathBuf,
    vars: Vec<(String, String)>,
}

impl EnvFile {
    /// Read and parse an environment file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Parse environment file content; `path` is only used in error messages.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let mut vars = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

            let err = |reason: &str| ConfigError::EnvFile {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: reason.to_string(),
            };

            let (key, value) = line.split_once('=').ok_or_else(|| err("missing '='"))?;
            let key = key.trim();
            if key.is_empty()
                || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                || key.starts_with(|c: char| c.is_ascii_digit())
            {
                return Err(err("invalid variable name"));
            }

            let value = unquote(value.trim()).ok_or_else(|| err("unterminated quote"))?;
            vars.push((key.to_string(), value));
        }

        Ok(Self {
            path: path.to_path_buf(),
            vars,
        })
    }

    /// Parsed variables, in file order.
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Export the variables into the process environment, skipping any that are
    /// already set. Returns the number of variables applied.
    ///
    /// Must run before any other thread is started.
    pub fn apply(&self) -> usize {
        let mut applied = 0;
        for (key, value) in &self.vars {
            if std::env::var_os(key).is_some() {
                continue;
            }
            // SAFETY: called from the single-threaded bootstrap, before the
            // async runtime or any logging worker thread exists.
            unsafe {
                std::env::set_var(key, value);
            }
            applied += 1;
        }
        debug!(
            "Applied {} of {} variables from {}",
            applied,
            self.vars.len(),
            self.path.display()
        );
        applied
    }
}

fn unquote(value: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            let end = rest.find(quote)?;
            return Some(rest[..end].to_string());
        }
    }
    // Unquoted values may carry a trailing comment.
    let value = match value.find(" #") {
        Some(pos) => &value[..pos],
        None => value,
    };
    Some(value.trim_end().to_string())
}
