//! Echo service: a small HTTP listener run by the launcher.
//!
//! ```text
//! GET  /        - greeting
//! POST /echo    - request body echoed back
//! GET  /health  - liveness (never behind auth)
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::predicate::SizeAbove;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use launcher_daemon::{
    Application, AuthMethod, AuthMethodConfig, Listener, LoadedConfig, ServeOptions,
};

/// Configuration target: the `[echo]` table.
#[derive(Debug, Default, Deserialize)]
pub struct EchoConfig {
    #[serde(default)]
    pub echo: EchoSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EchoSection {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for EchoSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            greeting: default_greeting(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_greeting() -> String {
    "Hello".to_string()
}

#[derive(Debug, Default, Clone)]
pub struct EchoApp;

#[async_trait]
impl Application for EchoApp {
    type Config = EchoConfig;

    fn check_config(&self, config: &LoadedConfig<EchoConfig>) -> anyhow::Result<()> {
        let echo = &config.app.echo;
        echo.bind
            .parse::<SocketAddr>()
            .with_context(|| format!("echo.bind: invalid address '{}'", echo.bind))?;
        if echo.greeting.trim().is_empty() {
            anyhow::bail!("echo.greeting: must not be empty");
        }
        Ok(())
    }

    async fn new_listener(
        &self,
        config: &LoadedConfig<EchoConfig>,
        serve: &ServeOptions,
    ) -> anyhow::Result<Box<dyn Listener>> {
        let addr = config
            .app
            .echo
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address '{}'", config.app.echo.bind))?;

        Ok(Box::new(EchoListener {
            addr,
            name: String::new(),
            description: String::new(),
            greeting: config.app.echo.greeting.clone(),
            users: None,
            serve: *serve,
            shutdown: CancellationToken::new(),
        }))
    }
}

type Users = HashMap<String, String>;

pub struct EchoListener {
    addr: SocketAddr,
    name: String,
    description: String,
    greeting: String,
    users: Option<Arc<Users>>,
    serve: ServeOptions,
    shutdown: CancellationToken,
}

struct EchoState {
    name: String,
    description: String,
    greeting: String,
    pretty_json: bool,
}

impl EchoListener {
    fn router(&self) -> Router {
        let state = Arc::new(EchoState {
            name: self.name.clone(),
            description: self.description.clone(),
            greeting: self.greeting.clone(),
            pretty_json: self.serve.pretty_json,
        });

        let mut protected = Router::new()
            .route("/", get(greet))
            .route("/echo", post(echo))
            .with_state(state.clone());
        if let Some(users) = &self.users {
            protected = protected.layer(middleware::from_fn_with_state(users.clone(), basic_auth));
        }

        Router::new()
            .route("/health", get(health))
            .with_state(state)
            .merge(protected)
            .layer(TraceLayer::new_for_http())
            .layer(
                CompressionLayer::new().compress_when(SizeAbove::new(self.serve.min_size_for_gzip)),
            )
    }
}

#[async_trait]
impl Listener for EchoListener {
    fn set_identity(&mut self, name: &str, description: &str) {
        self.name = name.to_string();
        self.description = description.to_string();
    }

    fn register_auth(
        &mut self,
        method: AuthMethod,
        settings: &AuthMethodConfig,
    ) -> anyhow::Result<()> {
        match method {
            AuthMethod::Basic => {
                self.users = Some(Arc::new(parse_users(settings)?));
                Ok(())
            }
            other => anyhow::bail!("authentication method {} is not supported", other),
        }
    }

    async fn start(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("bind {}", self.addr))?;
        info!("{} listening on {}", self.name, listener.local_addr()?);

        let token = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;
        Ok(())
    }

    fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Read `users` from the basic provider's options. Each entry is either
/// `name = "password"` or `name = { password = "..." }`.
fn parse_users(settings: &AuthMethodConfig) -> anyhow::Result<Users> {
    let table = settings
        .options
        .get("users")
        .and_then(|v| v.as_table())
        .context("basic auth requires a 'users' table")?;

    let mut users = Users::new();
    for (name, value) in table {
        let password = match value {
            toml::Value::String(p) => p.as_str(),
            toml::Value::Table(t) => t
                .get("password")
                .and_then(|p| p.as_str())
                .with_context(|| format!("user '{}' has no password", name))?,
            _ => anyhow::bail!("user '{}': expected a string or a table", name),
        };
        users.insert(name.clone(), password.to_string());
    }

    if users.is_empty() {
        anyhow::bail!("basic auth 'users' table is empty");
    }
    Ok(users)
}

/// `Basic <base64(user:password)>` to its parts.
fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

async fn basic_auth(State(users): State<Arc<Users>>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic)
        .is_some_and(|(user, password)| users.get(&user).is_some_and(|p| *p == password));

    if authorized {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Basic realm=\"echo\"")],
        )
            .into_response()
    }
}

async fn greet(State(state): State<Arc<EchoState>>) -> String {
    format!("{}\n", state.greeting)
}

async fn echo(body: Bytes) -> Bytes {
    body
}

async fn health(State(state): State<Arc<EchoState>>) -> Response {
    let payload = serde_json::json!({
        "status": "ok",
        "name": state.name,
        "description": state.description,
    });
    let body = if state.pretty_json {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    };

    match body {
        Ok(body) => ([(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[cfg(test)]
#[path = "echo_tests.rs"]
mod tests;
