//! OS service-manager bindings.
//!
//! A [`ServiceDescriptor`] is built once from the common configuration and
//! handed to the platform's [`ServiceManager`]: systemd on Linux, launchd on
//! macOS. Other platforms get [`UnsupportedManager`].

mod launchd;
mod systemd;

use std::path::{Path, PathBuf};

use tracing::{error, info};

use launcher_config::CommonConfig;

use crate::cli::ServiceVerb;
use crate::error::LauncherError;

pub use launchd::LaunchdManager;
pub use systemd::SystemdManager;

/// What the service manager needs to relaunch this process non-interactively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub executable: PathBuf,
    pub arguments: Vec<String>,
}

impl ServiceDescriptor {
    pub fn new(
        common: &CommonConfig,
        executable: PathBuf,
        config_path: &Path,
        env_path: Option<&Path>,
    ) -> Self {
        let mut arguments = vec![
            "--config".to_string(),
            config_path.display().to_string(),
        ];
        if let Some(env) = env_path {
            arguments.push("--env".to_string());
            arguments.push(env.display().to_string());
        }

        let description = if common.description.is_empty() {
            common.name.clone()
        } else {
            common.description.clone()
        };

        Self {
            name: common.name.clone(),
            display_name: common.name.clone(),
            description,
            executable,
            arguments,
        }
    }

    /// Descriptor for the running executable.
    pub fn for_current_exe(
        common: &CommonConfig,
        config_path: &Path,
        env_path: Option<&Path>,
    ) -> Result<Self, LauncherError> {
        let exe = std::env::current_exe()
            .map_err(|e| LauncherError::ServiceInit(format!("cannot locate executable: {}", e)))?;
        Ok(Self::new(common, exe, config_path, env_path))
    }
}

/// Control operations on an installed service.
pub trait ServiceManager: Send + Sync {
    /// Human-readable backend name.
    fn backend(&self) -> &'static str;

    fn install(&self) -> Result<(), LauncherError>;

    fn uninstall(&self) -> Result<(), LauncherError>;

    fn start(&self) -> Result<(), LauncherError>;

    fn stop(&self) -> Result<(), LauncherError>;

    fn restart(&self) -> Result<(), LauncherError> {
        self.stop()?;
        self.start()
    }
}

/// Manager for platforms without a supported service manager.
#[derive(Debug, Default)]
pub struct UnsupportedManager;

impl UnsupportedManager {
    fn fail(&self) -> Result<(), LauncherError> {
        Err(LauncherError::ServiceInit(format!(
            "service management is not supported on {}",
            std::env::consts::OS
        )))
    }
}

impl ServiceManager for UnsupportedManager {
    fn backend(&self) -> &'static str {
        "unsupported"
    }

    fn install(&self) -> Result<(), LauncherError> {
        self.fail()
    }

    fn uninstall(&self) -> Result<(), LauncherError> {
        self.fail()
    }

    fn start(&self) -> Result<(), LauncherError> {
        self.fail()
    }

    fn stop(&self) -> Result<(), LauncherError> {
        self.fail()
    }
}

/// The service manager of the running platform.
pub fn platform_manager(
    descriptor: ServiceDescriptor,
) -> Result<Box<dyn ServiceManager>, LauncherError> {
    if cfg!(target_os = "linux") {
        Ok(Box::new(SystemdManager::new(descriptor, !is_root())))
    } else if cfg!(target_os = "macos") {
        Ok(Box::new(LaunchdManager::new(descriptor, !is_root())))
    } else {
        Ok(Box::new(UnsupportedManager))
    }
}

/// Run a control verb against `manager`.
///
/// Permission failures become [`LauncherError::AccessDenied`] with an operator
/// hint in the log.
pub fn dispatch(manager: &dyn ServiceManager, verb: ServiceVerb) -> Result<(), LauncherError> {
    let result = match verb {
        ServiceVerb::Install => manager.install(),
        ServiceVerb::Uninstall => manager.uninstall(),
        ServiceVerb::Start => manager.start(),
        ServiceVerb::Stop => manager.stop(),
        ServiceVerb::Restart => manager.restart(),
        ServiceVerb::Run => {
            return Err(LauncherError::ServiceControl(
                "run is not a control verb".to_string(),
            ));
        }
    };

    match result {
        Ok(()) => {
            info!("Service {} via {}: done", verb, manager.backend());
            Ok(())
        }
        Err(LauncherError::ServiceControl(message)) => {
            let err = classify_error(message);
            if let LauncherError::AccessDenied(_) = err {
                error!(severity = "crit", "{}", err);
                error!(severity = "crit", "Try to run as administrator");
            } else {
                error!(severity = "crit", "{}", err);
            }
            Err(err)
        }
        Err(other) => {
            error!(severity = "crit", "{}", other);
            Err(other)
        }
    }
}

const DENIAL_MARKERS: [&str; 4] = [
    "access is denied",
    "access denied",
    "permission denied",
    "interactive authentication required",
];

/// Map a control failure message to `AccessDenied` or `ServiceControl`.
pub fn classify_error(message: String) -> LauncherError {
    let lower = message.to_lowercase();
    if DENIAL_MARKERS.iter().any(|m| lower.contains(m)) {
        LauncherError::AccessDenied(message)
    } else {
        LauncherError::ServiceControl(message)
    }
}

/// Run a manager command line, turning a non-zero exit into a control error.
fn run_command(program: &str, args: &[&str]) -> Result<String, LauncherError> {
    let output = std::process::Command::new(program)
        .args(args)
        .output()
        .map_err(|e| LauncherError::ServiceControl(format!("Failed to execute {}: {}", program, e)))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(LauncherError::ServiceControl(format!(
            "{} {}: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

#[cfg(unix)]
fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
