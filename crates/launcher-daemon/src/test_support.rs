//! Scriptable application and listener for lifecycle tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use launcher_config::{AuthMethod, AuthMethodConfig, ConfigLoader, LoadedConfig};

use crate::app::{Application, Listener, ServeOptions};
use crate::cli::CliArgs;
use crate::context::BootstrapContext;
use crate::logging::LogLevels;
use crate::state::LifecycleState;

#[derive(Debug, Default, Deserialize)]
pub struct MockConfig {
    #[serde(default)]
    pub mock: MockSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct MockSection {
    #[serde(default)]
    pub reject: Option<String>,
    /// `start` returns as soon as it is called.
    #[serde(default)]
    pub exit_on_start: bool,
}

/// Shared record of what the application and its listener were asked to do.
#[derive(Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<String>>>,
    stops: Arc<AtomicUsize>,
}

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct MockApp {
    pub journal: Journal,
    pub fail_new_listener: bool,
    pub fail_auth: Option<AuthMethod>,
    pub fail_start: bool,
}

#[async_trait]
impl Application for MockApp {
    type Config = MockConfig;

    fn check_config(&self, config: &LoadedConfig<MockConfig>) -> anyhow::Result<()> {
        self.journal.push("check_config");
        match &config.app.mock.reject {
            Some(reason) => anyhow::bail!("{}", reason),
            None => Ok(()),
        }
    }

    async fn new_listener(
        &self,
        config: &LoadedConfig<MockConfig>,
        serve: &ServeOptions,
    ) -> anyhow::Result<Box<dyn Listener>> {
        self.journal.push(format!("new_listener:{}", serve.min_size_for_gzip));
        if self.fail_new_listener {
            anyhow::bail!("port already in use");
        }
        Ok(Box::new(MockListener {
            journal: self.journal.clone(),
            fail_auth: self.fail_auth,
            fail_start: self.fail_start,
            exit_on_start: config.app.mock.exit_on_start,
            token: CancellationToken::new(),
        }))
    }
}

pub struct MockListener {
    journal: Journal,
    fail_auth: Option<AuthMethod>,
    fail_start: bool,
    exit_on_start: bool,
    token: CancellationToken,
}

#[async_trait]
impl Listener for MockListener {
    fn set_identity(&mut self, name: &str, description: &str) {
        self.journal.push(format!("identity:{}:{}", name, description));
    }

    fn register_auth(&mut self, method: AuthMethod, _settings: &AuthMethodConfig) -> anyhow::Result<()> {
        self.journal.push(format!("auth:{}", method));
        if self.fail_auth == Some(method) {
            anyhow::bail!("{} backend unreachable", method);
        }
        Ok(())
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.journal.push("start");
        if self.fail_start {
            anyhow::bail!("bind failed");
        }
        if !self.exit_on_start {
            self.token.cancelled().await;
        }
        self.journal.push("start_returned");
        Ok(())
    }

    fn stop(&self) {
        self.journal.stops.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
    }
}

/// Load `text` and build a context already in the `Validated` state.
pub fn validated(text: &str) -> (LoadedConfig<MockConfig>, BootstrapContext) {
    let config = ConfigLoader::load_str::<MockConfig>(text).unwrap();
    let levels = LogLevels::from_common(&config.common).unwrap();
    let ctx = BootstrapContext::new(CliArgs::default(), PathBuf::from("/tmp/mock.toml"), levels);
    ctx.state.transition(LifecycleState::ConfigLoaded).unwrap();
    ctx.state.transition(LifecycleState::Validated).unwrap();
    (config, ctx)
}
