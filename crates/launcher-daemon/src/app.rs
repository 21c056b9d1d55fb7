//! The contract between an application and the launcher.

use async_trait::async_trait;

use launcher_config::{AuthMethod, AuthMethodConfig, CommonConfig, LoadedConfig};

/// Settings for the HTTP serving layer, handed to the listener factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServeOptions {
    /// Responses smaller than this are sent uncompressed.
    pub min_size_for_gzip: u16,
    /// Emit JSON payloads pretty-printed.
    pub pretty_json: bool,
}

impl ServeOptions {
    pub fn from_common(common: &CommonConfig) -> Self {
        Self {
            min_size_for_gzip: common.min_size_for_gzip,
            pretty_json: common.pretty_json,
        }
    }
}

/// Identity printed by `--version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub build_time: Option<String>,
    pub copyright: String,
}

impl AppInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            build_time: None,
            copyright: String::new(),
        }
    }

    pub fn build_time(mut self, ts: impl Into<String>) -> Self {
        self.build_time = Some(ts.into());
        self
    }

    pub fn copyright(mut self, text: impl Into<String>) -> Self {
        self.copyright = text.into();
        self
    }

    /// The `--version` text.
    pub fn version_text(&self) -> String {
        let ts = match self.build_time.as_deref() {
            Some(ts) if !ts.is_empty() => format!(" [{}Z]", ts),
            _ => String::new(),
        };
        format!(
            "{} {}{}, {}/{}\n{}",
            self.name,
            self.version,
            ts,
            std::env::consts::OS,
            std::env::consts::ARCH,
            self.copyright
        )
    }
}

/// Build an [`AppInfo`] from the calling crate's package metadata.
///
/// The build timestamp is taken from `LAUNCHER_BUILD_TIME` at compile time.
#[macro_export]
macro_rules! app_info {
    () => {{
        let mut info = $crate::AppInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            .copyright(env!("CARGO_PKG_AUTHORS"));
        if let Some(ts) = option_env!("LAUNCHER_BUILD_TIME") {
            info = info.build_time(ts);
        }
        info
    }};
}

/// A long-running service object.
///
/// `start` resolves when the service terminates. `stop` may be called from
/// another task while `start` is pending, and more than once; only the first
/// call has an effect.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Set the service name and description.
    fn set_identity(&mut self, name: &str, description: &str);

    /// Register an authentication provider.
    fn register_auth(
        &mut self,
        method: AuthMethod,
        _settings: &AuthMethodConfig,
    ) -> anyhow::Result<()> {
        anyhow::bail!("authentication method {} is not supported", method)
    }

    /// Serve until stopped.
    async fn start(&self) -> anyhow::Result<()>;

    /// Request termination.
    fn stop(&self);
}

/// What an application supplies to be run by the launcher.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// Application configuration, deserialized from the whole config file.
    type Config: serde::de::DeserializeOwned + Send + Sync + 'static;

    /// Semantic validation beyond parsing.
    fn check_config(&self, config: &LoadedConfig<Self::Config>) -> anyhow::Result<()>;

    /// Build the listener.
    async fn new_listener(
        &self,
        config: &LoadedConfig<Self::Config>,
        serve: &ServeOptions,
    ) -> anyhow::Result<Box<dyn Listener>>;
}
