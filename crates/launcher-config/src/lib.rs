//! # Launcher Config
//!
//! Configuration collaborator for launcher-managed services: loads a TOML file
//! into an application-defined target plus the shared `[common]` section,
//! validates the common section and masks secrets before the text is logged.

mod env_file;
mod error;
mod level;
mod loader;
mod schema;
mod secrets;
mod validator;

pub use env_file::EnvFile;
pub use error::ConfigError;
pub use level::{level_filter, parse_level};
pub use loader::{ConfigLoader, LoadedConfig};
pub use schema::*;
pub use secrets::SecretMasker;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
