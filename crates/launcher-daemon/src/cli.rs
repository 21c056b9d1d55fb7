//! Command-line surface shared by every launcher-managed service.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Launcher command-line arguments.
#[derive(Debug, Clone, Default, Parser)]
#[command(disable_version_flag = true)]
pub struct CliArgs {
    /// Configuration file to use
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Environment file to load before the configuration
    #[arg(long = "env", value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Print version information and exit
    #[arg(long)]
    pub version: bool,

    /// Always capture stack traces of failed tasks
    #[arg(long)]
    pub debug: bool,

    /// Write captured stack traces to the log at alert severity
    #[arg(long)]
    pub dump_panic_ids: bool,

    /// Do not echo log output to the console
    #[arg(long)]
    pub disable_console_log: bool,

    /// Service control
    #[arg(long = "service", value_enum, value_name = "VERB")]
    pub service: Option<ServiceVerb>,
}

/// Service-control verbs understood by the service adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceVerb {
    Install,
    Start,
    Stop,
    Restart,
    Uninstall,
    /// Run in the foreground as a managed service.
    Run,
}

impl std::fmt::Display for ServiceVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceVerb::Install => write!(f, "install"),
            ServiceVerb::Start => write!(f, "start"),
            ServiceVerb::Stop => write!(f, "stop"),
            ServiceVerb::Restart => write!(f, "restart"),
            ServiceVerb::Uninstall => write!(f, "uninstall"),
            ServiceVerb::Run => write!(f, "run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let args = CliArgs::try_parse_from([
            "svc",
            "--config",
            "/etc/svc.toml",
            "--env",
            "/etc/svc.env",
            "--debug",
            "--dump-panic-ids",
            "--disable-console-log",
            "--service",
            "install",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("/etc/svc.toml")));
        assert_eq!(args.env_file, Some(PathBuf::from("/etc/svc.env")));
        assert!(args.debug);
        assert!(args.dump_panic_ids);
        assert!(args.disable_console_log);
        assert_eq!(args.service, Some(ServiceVerb::Install));
        assert!(!args.version);
    }

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["svc"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.service.is_none());
    }

    #[test]
    fn test_version_flag_is_ours() {
        let args = CliArgs::try_parse_from(["svc", "--version"]).unwrap();
        assert!(args.version);
    }

    #[test]
    fn test_unknown_service_verb() {
        assert!(CliArgs::try_parse_from(["svc", "--service", "reload"]).is_err());
    }

    #[test]
    fn test_verb_display() {
        assert_eq!(ServiceVerb::Uninstall.to_string(), "uninstall");
        assert_eq!(ServiceVerb::Run.to_string(), "run");
    }
}
