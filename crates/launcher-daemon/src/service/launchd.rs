//! launchd plist generation and `launchctl` control.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::error::LauncherError;

use super::{current_uid, run_command, ServiceDescriptor, ServiceManager};

/// launchd backend: a LaunchAgent for users, a LaunchDaemon for root.
#[derive(Debug)]
pub struct LaunchdManager {
    descriptor: ServiceDescriptor,
    agent: bool,
    keep_alive: bool,
    throttle_interval: u32,
}

impl LaunchdManager {
    pub fn new(descriptor: ServiceDescriptor, agent: bool) -> Self {
        Self {
            descriptor,
            agent,
            keep_alive: true,
            throttle_interval: 10,
        }
    }

    pub fn label(&self) -> &str {
        &self.descriptor.name
    }

    pub fn plist_path(&self) -> PathBuf {
        let file = format!("{}.plist", self.label());
        if self.agent {
            dirs::home_dir()
                .map(|h| h.join("Library").join("LaunchAgents").join(&file))
                .unwrap_or_else(|| PathBuf::from("/tmp").join(&file))
        } else {
            PathBuf::from("/Library/LaunchDaemons").join(file)
        }
    }

    fn domain(&self) -> String {
        if self.agent {
            format!("gui/{}", current_uid())
        } else {
            "system".to_string()
        }
    }

    fn service_target(&self) -> String {
        format!("{}/{}", self.domain(), self.label())
    }

    pub fn generate_plist(&self) -> String {
        let d = &self.descriptor;
        let mut plist = String::new();
        plist.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        plist.push_str("<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n");
        plist.push_str("<plist version=\"1.0\">\n");
        plist.push_str("<dict>\n");

        plist.push_str("    <key>Label</key>\n");
        plist.push_str(&format!("    <string>{}</string>\n", escape_xml(self.label())));

        plist.push_str("    <key>ProgramArguments</key>\n");
        plist.push_str("    <array>\n");
        plist.push_str(&format!(
            "        <string>{}</string>\n",
            escape_xml(&d.executable.display().to_string())
        ));
        for arg in &d.arguments {
            plist.push_str(&format!("        <string>{}</string>\n", escape_xml(arg)));
        }
        plist.push_str("    </array>\n");

        if let Some(dir) = d.executable.parent() {
            plist.push_str("    <key>WorkingDirectory</key>\n");
            plist.push_str(&format!(
                "    <string>{}</string>\n",
                escape_xml(&dir.display().to_string())
            ));
        }

        plist.push_str("    <key>RunAtLoad</key>\n");
        plist.push_str("    <true/>\n");
        plist.push_str("    <key>KeepAlive</key>\n");
        plist.push_str(&format!("    <{}/>\n", self.keep_alive));
        plist.push_str("    <key>ThrottleInterval</key>\n");
        plist.push_str(&format!("    <integer>{}</integer>\n", self.throttle_interval));
        plist.push_str("    <key>ProcessType</key>\n");
        plist.push_str("    <string>Background</string>\n");

        plist.push_str("</dict>\n");
        plist.push_str("</plist>\n");
        plist
    }
}

impl ServiceManager for LaunchdManager {
    fn backend(&self) -> &'static str {
        "launchd"
    }

    fn install(&self) -> Result<(), LauncherError> {
        let path = self.plist_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LauncherError::ServiceControl(format!("{}: {}", parent.display(), e))
            })?;
        }
        fs::write(&path, self.generate_plist())
            .map_err(|e| LauncherError::ServiceControl(format!("{}: {}", path.display(), e)))?;
        info!("Created launchd plist at {}", path.display());

        let domain = self.domain();
        let path_str = path.to_string_lossy();
        match run_command("launchctl", &["bootstrap", domain.as_str(), path_str.as_ref()]) {
            Err(LauncherError::ServiceControl(msg)) if msg.contains("already loaded") => {
                info!("{} already loaded", self.label());
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    fn uninstall(&self) -> Result<(), LauncherError> {
        let target = self.service_target();
        let _ = run_command("launchctl", &["bootout", target.as_str()]);

        let path = self.plist_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                LauncherError::ServiceControl(format!("{}: {}", path.display(), e))
            })?;
            info!("Removed launchd plist {}", path.display());
        }
        Ok(())
    }

    fn start(&self) -> Result<(), LauncherError> {
        let target = self.service_target();
        run_command("launchctl", &["kickstart", target.as_str()]).map(|_| ())
    }

    fn stop(&self) -> Result<(), LauncherError> {
        let target = self.service_target();
        run_command("launchctl", &["kill", "SIGTERM", target.as_str()]).map(|_| ())
    }

    fn restart(&self) -> Result<(), LauncherError> {
        let target = self.service_target();
        run_command("launchctl", &["kickstart", "-k", target.as_str()]).map(|_| ())
    }
}

/// Escape special characters for XML.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
#[path = "launchd_tests.rs"]
mod tests;
