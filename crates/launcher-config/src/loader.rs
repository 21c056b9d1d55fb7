//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ConfigError;
use crate::schema::CommonConfig;

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid")
});

/// A configuration file loaded into the application's target type plus the
/// shared `[common]` section. Never mutated after loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig<C> {
    /// Absolute path the configuration was read from.
    pub path: PathBuf,
    /// Configuration text after environment expansion.
    pub text: String,
    /// Application-specific configuration.
    pub app: C,
    /// Shared section.
    pub common: CommonConfig,
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load<C: DeserializeOwned>(path: &Path) -> Result<LoadedConfig<C>, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut loaded = Self::load_str(&content)?;
        loaded.path = path.to_path_buf();
        Ok(loaded)
    }

    /// Load configuration from a string.
    pub fn load_str<C: DeserializeOwned>(content: &str) -> Result<LoadedConfig<C>, ConfigError> {
        let text = Self::expand_env_vars(content)?;
        let table: toml::Table = toml::from_str(&text)?;

        let app = C::deserialize(toml::Value::Table(table.clone()))
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let common = match table.get("common") {
            Some(section) => CommonConfig::deserialize(section.clone())
                .map_err(|e| ConfigError::InvalidFormat(format!("[common]: {}", e)))?,
            None => return Err(ConfigError::MissingCommon),
        };

        Ok(LoadedConfig {
            path: PathBuf::new(),
            text,
            app,
            common,
        })
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();

        for cap in ENV_VAR_RE.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }
}
