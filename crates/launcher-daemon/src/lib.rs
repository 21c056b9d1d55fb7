//! # Launcher Daemon
//!
//! Bootstrap and lifecycle orchestration for long-running services.
//!
//! ## Features
//!
//! - Command line (`--config`, `--env`, `--version`, `--service <verb>`, ...)
//! - Configuration loading, validation and masked config dump
//! - Console and rolling file logging with per-target levels
//! - Listener lifecycle with a shutdown watcher (SIGTERM/SIGINT)
//! - Periodic memory and scheduler diagnostics
//! - Panic traps with correlation ids
//! - Linux systemd and macOS launchd service control
//! - One exit status per failure class
//!
//! ## Usage
//!
//! ```rust,ignore
//! use launcher_daemon::{app_info, bootstrap};
//!
//! fn main() -> std::process::ExitCode {
//!     bootstrap::run(MyApp::default(), app_info!())
//! }
//! ```
//!
//! ## System Service Installation
//!
//! ```text
//! my-service --config /etc/my-service.toml --service install
//! my-service --config /etc/my-service.toml --service start
//! ```

pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod logging;
pub mod runner;
pub mod runtime;
pub mod service;
pub mod signal;
pub mod state;
pub mod trap;
pub mod watcher;

#[cfg(test)]
mod test_support;

// Re-exports
pub use app::{AppInfo, Application, Listener, ServeOptions};
pub use cli::{CliArgs, ServiceVerb};
pub use context::BootstrapContext;
pub use diagnostics::{CountingAllocator, DiagnosticsReporter, MemSample};
pub use error::{ExitStatus, LauncherError};
pub use host::{DirectHost, LifecycleHost, ServiceHost};
pub use signal::ShutdownSignal;
pub use state::{LifecycleState, StateCell};
pub use trap::{FailureRecord, TaskOutcome, TrapOptions};

pub use launcher_config::{AuthMethod, AuthMethodConfig, CommonConfig, LoadedConfig};
