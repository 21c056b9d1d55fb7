//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    /// The file parsed but has no `[common]` section.
    #[error("Config has an incorrect structure: missing [common] section")]
    MissingCommon,

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Invalid environment file {path}, line {line}: {reason}")]
    EnvFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Whether the error describes a file that parsed but has the wrong shape,
    /// as opposed to a file that could not be read or parsed at all.
    pub fn is_structural(&self) -> bool {
        matches!(self, ConfigError::MissingCommon)
    }
}
