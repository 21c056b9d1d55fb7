//! Launcher errors and the process exit-status registry.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::LifecycleState;

/// Process exit statuses, one per failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitStatus {
    /// `--version` was requested.
    Version = 100,
    /// No configuration path could be resolved.
    MissingConfigFile = 101,
    /// Configuration (or environment) file unreadable or malformed.
    IncorrectConfigFile = 102,
    /// Configuration parsed but has the wrong structure.
    ConfigIncorrect = 103,
    /// The application rejected the configuration.
    ConfigErrors = 104,
    /// The listener could not be constructed.
    CreateListenerError = 105,
    /// The listener failed while starting or running.
    StartListenerError = 106,
    /// The OS service manager binding could not be initialized.
    ServiceInitializationError = 107,
    /// A service-control verb failed.
    ServiceError = 108,
    /// A service-control verb was refused by the OS.
    AccessDenied = 109,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExitStatus::Version => "version",
            ExitStatus::MissingConfigFile => "missing_config_file",
            ExitStatus::IncorrectConfigFile => "incorrect_config_file",
            ExitStatus::ConfigIncorrect => "config_incorrect",
            ExitStatus::ConfigErrors => "config_errors",
            ExitStatus::CreateListenerError => "create_listener_error",
            ExitStatus::StartListenerError => "start_listener_error",
            ExitStatus::ServiceInitializationError => "service_initialization_error",
            ExitStatus::ServiceError => "service_error",
            ExitStatus::AccessDenied => "access_denied",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Errors raised while bootstrapping or supervising a service.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// No configuration path given and none could be derived.
    #[error("Missing configuration file: {0}")]
    MissingConfig(String),

    /// Environment file could not be loaded.
    #[error("Incorrect environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: launcher_config::ConfigError,
    },

    /// Configuration file could not be read or parsed.
    #[error("Incorrect config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: launcher_config::ConfigError,
    },

    /// Configuration parsed but its structure is wrong.
    #[error("Config has an incorrect structure: {0}")]
    ConfigStructure(String),

    /// Application-level validation failed.
    #[error("Config errors: {0}")]
    ConfigErrors(String),

    /// Listener construction failed.
    #[error("Create listener error: {0}")]
    CreateListener(String),

    /// An authentication provider could not be registered.
    #[error("Auth provider {method} registration error: {reason}")]
    AuthRegistration { method: String, reason: String },

    /// Listener start failed.
    #[error("Start listener error: {0}")]
    StartListener(String),

    /// Service manager binding could not be created.
    #[error("Service initialization error: {0}")]
    ServiceInit(String),

    /// Service control verb failed.
    #[error("Service control error: {0}")]
    ServiceControl(String),

    /// Service control verb was refused for lack of privileges.
    #[error("Service control access denied: {0}")]
    AccessDenied(String),

    /// Failed to set up signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// Logging could not be configured.
    #[error("Logging setup error: {0}")]
    Logging(String),

    /// The async runtime could not be built.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Invalid lifecycle state transition.
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// A trapped task panicked.
    #[error("Task {task} failed [{correlation_id}]: {message}")]
    Panicked {
        task: String,
        correlation_id: String,
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LauncherError {
    /// Exit status the process terminates with for this error.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            LauncherError::MissingConfig(_) => ExitStatus::MissingConfigFile,
            LauncherError::EnvFile { .. } | LauncherError::ConfigFile { .. } => {
                ExitStatus::IncorrectConfigFile
            }
            LauncherError::ConfigStructure(_) => ExitStatus::ConfigIncorrect,
            LauncherError::ConfigErrors(_) => ExitStatus::ConfigErrors,
            LauncherError::CreateListener(_) | LauncherError::AuthRegistration { .. } => {
                ExitStatus::CreateListenerError
            }
            LauncherError::StartListener(_)
            | LauncherError::SignalSetup(_)
            | LauncherError::Runtime(_)
            | LauncherError::Panicked { .. } => ExitStatus::StartListenerError,
            LauncherError::ServiceInit(_) => ExitStatus::ServiceInitializationError,
            LauncherError::ServiceControl(_) => ExitStatus::ServiceError,
            LauncherError::AccessDenied(_) => ExitStatus::AccessDenied,
            LauncherError::Logging(_) | LauncherError::Io(_) => ExitStatus::IncorrectConfigFile,
            LauncherError::InvalidStateTransition { .. } => ExitStatus::StartListenerError,
        }
    }
}
