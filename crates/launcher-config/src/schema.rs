//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::level::parse_level;

/// The `[common]` section every launcher-managed service shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Service name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Service description.
    #[serde(default)]
    pub description: String,

    /// Log directory. Empty disables the file sink.
    #[serde(default)]
    pub log_dir: String,

    /// Global log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-subsystem log levels, keyed by tracing target.
    #[serde(default)]
    pub log_levels: BTreeMap<String, String>,

    /// Stamp log lines with local time instead of UTC.
    #[serde(default = "default_true")]
    pub log_local_time: bool,

    /// Log file rotation: minutely, hourly, daily or never.
    #[serde(default = "default_log_rotation")]
    pub log_rotation: String,

    /// Number of rotated log files to keep.
    #[serde(default = "default_log_max_files")]
    pub log_max_files: usize,

    /// Lines buffered by the non-blocking file writer (0 = writer default).
    #[serde(default)]
    pub log_buffer_size: usize,

    /// Maximum bytes per log line (0 = unlimited).
    #[serde(default)]
    pub log_max_string_len: usize,

    /// Emit log lines as JSON objects.
    #[serde(default)]
    pub log_json: bool,

    /// Worker threads of the async runtime (0 = one per CPU).
    #[serde(default)]
    pub concurrency: usize,

    /// Install scheduler park/unpark sampling hooks.
    #[serde(default)]
    pub deep_profiling: bool,

    /// Diagnostics sampling period in seconds; zero or negative disables it.
    #[serde(default)]
    pub mem_stats_period: i64,

    /// Severity of diagnostics lines.
    #[serde(default = "default_mem_stats_level")]
    pub mem_stats_level: String,

    /// Minimum response size, in bytes, before responses are compressed.
    #[serde(default)]
    pub min_size_for_gzip: u16,

    /// Pretty-print JSON response payloads.
    #[serde(default)]
    pub pretty_json: bool,

    /// Keys whose quoted values are masked when the config text is logged.
    #[serde(default = "default_secret_keys")]
    pub secret_keys: Vec<String>,

    /// Authentication providers.
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_name() -> String {
    "launcher".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

fn default_log_max_files() -> usize {
    30
}

fn default_mem_stats_level() -> String {
    "DEBUG".to_string()
}

fn default_secret_keys() -> Vec<String> {
    vec!["password".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: String::new(),
            log_dir: String::new(),
            log_level: default_log_level(),
            log_levels: BTreeMap::new(),
            log_local_time: true,
            log_rotation: default_log_rotation(),
            log_max_files: default_log_max_files(),
            log_buffer_size: 0,
            log_max_string_len: 0,
            log_json: false,
            concurrency: 0,
            deep_profiling: false,
            mem_stats_period: 0,
            mem_stats_level: default_mem_stats_level(),
            min_size_for_gzip: 0,
            pretty_json: false,
            secret_keys: default_secret_keys(),
            auth: AuthConfig::default(),
        }
    }
}

impl CommonConfig {
    /// Diagnostics sampling period, or `None` when diagnostics are disabled.
    pub fn mem_stats_period(&self) -> Option<Duration> {
        u64::try_from(self.mem_stats_period)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Diagnostics severity; unrecognized names fall back to DEBUG.
    pub fn mem_stats_level(&self) -> tracing::Level {
        parse_level(&self.mem_stats_level).unwrap_or(tracing::Level::DEBUG)
    }

    /// Parsed rotation policy, if the configured name is recognized.
    pub fn log_rotation(&self) -> Option<LogRotation> {
        LogRotation::parse(&self.log_rotation)
    }

    /// Keys masked in the config dump: `secret_keys` plus the user names of
    /// `[common.auth.basic.users]` entries written as `user = "password"`.
    pub fn masked_keys(&self) -> Vec<String> {
        let mut keys = self.secret_keys.clone();
        let users = self
            .auth
            .basic
            .as_ref()
            .and_then(|basic| basic.options.get("users"))
            .and_then(|users| users.as_table());
        if let Some(users) = users {
            keys.extend(
                users
                    .iter()
                    .filter(|(_, value)| value.is_str())
                    .map(|(name, _)| name.clone()),
            );
        }
        keys
    }

    /// Log directory with `~` and `$VAR` expanded; `None` when file logging is off.
    pub fn log_dir(&self) -> Option<PathBuf> {
        if self.log_dir.trim().is_empty() {
            return None;
        }
        let expanded = shellexpand::full(&self.log_dir)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.log_dir.clone());
        Some(PathBuf::from(expanded))
    }
}

/// Log file rotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "minutely" => Some(LogRotation::Minutely),
            "hourly" => Some(LogRotation::Hourly),
            "daily" => Some(LogRotation::Daily),
            "never" | "" => Some(LogRotation::Never),
            _ => None,
        }
    }
}

/// Authentication method, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Basic,
    Jwt,
    Krb5,
    Keycloak,
    Url,
}

impl AuthMethod {
    /// All methods in the order providers are registered.
    pub const ALL: [AuthMethod; 5] = [
        AuthMethod::Basic,
        AuthMethod::Jwt,
        AuthMethod::Krb5,
        AuthMethod::Keycloak,
        AuthMethod::Url,
    ];
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Basic => write!(f, "basic"),
            AuthMethod::Jwt => write!(f, "jwt"),
            AuthMethod::Krb5 => write!(f, "krb5"),
            AuthMethod::Keycloak => write!(f, "keycloak"),
            AuthMethod::Url => write!(f, "url"),
        }
    }
}

/// Settings of one authentication provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthMethodConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider-specific options, passed through untouched.
    #[serde(flatten)]
    pub options: toml::Table,
}

/// `[common.auth]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub basic: Option<AuthMethodConfig>,

    #[serde(default)]
    pub jwt: Option<AuthMethodConfig>,

    #[serde(default)]
    pub krb5: Option<AuthMethodConfig>,

    #[serde(default)]
    pub keycloak: Option<AuthMethodConfig>,

    #[serde(default)]
    pub url: Option<AuthMethodConfig>,
}

impl AuthConfig {
    pub fn get(&self, method: AuthMethod) -> Option<&AuthMethodConfig> {
        match method {
            AuthMethod::Basic => self.basic.as_ref(),
            AuthMethod::Jwt => self.jwt.as_ref(),
            AuthMethod::Krb5 => self.krb5.as_ref(),
            AuthMethod::Keycloak => self.keycloak.as_ref(),
            AuthMethod::Url => self.url.as_ref(),
        }
    }

    /// Enabled providers in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = (AuthMethod, &AuthMethodConfig)> {
        AuthMethod::ALL
            .into_iter()
            .filter_map(|m| self.get(m).filter(|c| c.enabled).map(|c| (m, c)))
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
