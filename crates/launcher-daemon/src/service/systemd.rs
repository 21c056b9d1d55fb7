//! systemd unit generation and `systemctl` control.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::LauncherError;

use super::{run_command, ServiceDescriptor, ServiceManager};

/// systemd backend. User units live under `~/.config/systemd/user`.
#[derive(Debug)]
pub struct SystemdManager {
    descriptor: ServiceDescriptor,
    user_mode: bool,
    restart: String,
    restart_sec: u32,
    after: Vec<String>,
    wanted_by: String,
}

impl SystemdManager {
    pub fn new(descriptor: ServiceDescriptor, user_mode: bool) -> Self {
        let wanted_by = if user_mode {
            "default.target"
        } else {
            "multi-user.target"
        };
        Self {
            descriptor,
            user_mode,
            restart: "on-failure".to_string(),
            restart_sec: 5,
            after: vec!["network.target".to_string()],
            wanted_by: wanted_by.to_string(),
        }
    }

    fn unit_name(&self) -> String {
        format!("{}.service", self.descriptor.name)
    }

    pub fn unit_path(&self) -> PathBuf {
        if self.user_mode {
            dirs::config_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("systemd")
                .join("user")
                .join(self.unit_name())
        } else {
            PathBuf::from("/etc/systemd/system").join(self.unit_name())
        }
    }

    pub fn generate_unit(&self) -> String {
        let d = &self.descriptor;
        let mut unit = String::new();

        unit.push_str("[Unit]\n");
        unit.push_str(&format!("Description={}\n", d.description));
        if !self.after.is_empty() {
            unit.push_str(&format!("After={}\n", self.after.join(" ")));
        }
        unit.push('\n');

        unit.push_str("[Service]\n");
        unit.push_str("Type=simple\n");
        let mut exec = vec![quote_arg(&d.executable.display().to_string())];
        exec.extend(d.arguments.iter().map(|a| quote_arg(a)));
        unit.push_str(&format!("ExecStart={}\n", exec.join(" ")));
        if let Some(dir) = d.executable.parent() {
            unit.push_str(&format!("WorkingDirectory={}\n", dir.display()));
        }
        unit.push_str(&format!("Restart={}\n", self.restart));
        unit.push_str(&format!("RestartSec={}\n", self.restart_sec));
        unit.push_str("KillSignal=SIGTERM\n");
        unit.push_str(&format!("SyslogIdentifier={}\n", d.name));
        if !self.user_mode {
            unit.push_str("NoNewPrivileges=true\n");
            unit.push_str("PrivateTmp=true\n");
        }
        unit.push('\n');

        unit.push_str("[Install]\n");
        unit.push_str(&format!("WantedBy={}\n", self.wanted_by));
        unit
    }

    fn systemctl(&self, verb: &str, with_unit: bool) -> Result<(), LauncherError> {
        let unit = self.unit_name();
        let mut args = Vec::with_capacity(3);
        if self.user_mode {
            args.push("--user");
        }
        args.push(verb);
        if with_unit {
            args.push(unit.as_str());
        }
        run_command("systemctl", &args)?;
        debug!("systemctl {} {}", verb, if with_unit { unit.as_str() } else { "" });
        Ok(())
    }
}

impl ServiceManager for SystemdManager {
    fn backend(&self) -> &'static str {
        "systemd"
    }

    fn install(&self) -> Result<(), LauncherError> {
        let path = self.unit_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LauncherError::ServiceControl(format!("{}: {}", parent.display(), e))
            })?;
        }
        fs::write(&path, self.generate_unit())
            .map_err(|e| LauncherError::ServiceControl(format!("{}: {}", path.display(), e)))?;
        info!("Created systemd unit at {}", path.display());

        self.systemctl("daemon-reload", false)?;
        self.systemctl("enable", true)
    }

    fn uninstall(&self) -> Result<(), LauncherError> {
        let _ = self.systemctl("stop", true);
        let _ = self.systemctl("disable", true);

        let path = self.unit_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                LauncherError::ServiceControl(format!("{}: {}", path.display(), e))
            })?;
            info!("Removed systemd unit {}", path.display());
        }
        self.systemctl("daemon-reload", false)
    }

    fn start(&self) -> Result<(), LauncherError> {
        self.systemctl("start", true)
    }

    fn stop(&self) -> Result<(), LauncherError> {
        self.systemctl("stop", true)
    }

    fn restart(&self) -> Result<(), LauncherError> {
        self.systemctl("restart", true)
    }
}

/// Quote an `ExecStart=` word when it contains whitespace or quotes.
fn quote_arg(arg: &str) -> String {
    if arg.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
#[path = "systemd_tests.rs"]
mod tests;
