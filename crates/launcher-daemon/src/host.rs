//! Where the lifecycle runner executes.
//!
//! A foreground launch without a control verb runs the listener directly. A
//! launch by the OS service manager, or any `--service` verb, goes through the
//! [`ServiceHost`], which either runs the listener as a managed service or
//! dispatches the verb to the platform's service manager.

use tokio::runtime::Runtime;
use tracing::{error, info};

use launcher_config::LoadedConfig;

use crate::app::Application;
use crate::cli::ServiceVerb;
use crate::context::BootstrapContext;
use crate::error::LauncherError;
use crate::runner;
use crate::service::{self, ServiceDescriptor, ServiceManager};
use crate::state::LifecycleState;
use crate::trap::trapped;

/// Strategy that decides how the lifecycle runner is started and stopped.
pub trait LifecycleHost<A: Application> {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        app: &A,
        config: &LoadedConfig<A::Config>,
        ctx: &BootstrapContext,
        rt: &Runtime,
    ) -> Result<(), LauncherError>;
}

/// Runs the lifecycle in the current process, in the foreground.
#[derive(Debug, Default)]
pub struct DirectHost;

impl<A: Application> LifecycleHost<A> for DirectHost {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn run(
        &self,
        app: &A,
        config: &LoadedConfig<A::Config>,
        ctx: &BootstrapContext,
        rt: &Runtime,
    ) -> Result<(), LauncherError> {
        info!("Started as an application");
        run_lifecycle(app, config, ctx, rt)
    }
}

/// Builds the service manager for a descriptor.
pub type ManagerFactory =
    Box<dyn Fn(ServiceDescriptor) -> Result<Box<dyn ServiceManager>, LauncherError> + Send + Sync>;

/// Mediates between the lifecycle and the OS service manager.
pub struct ServiceHost {
    verb: Option<ServiceVerb>,
    factory: ManagerFactory,
}

impl ServiceHost {
    pub fn new(verb: Option<ServiceVerb>) -> Self {
        Self::with_factory(verb, Box::new(service::platform_manager))
    }

    pub fn with_factory(verb: Option<ServiceVerb>, factory: ManagerFactory) -> Self {
        Self { verb, factory }
    }

    fn control(
        &self,
        verb: ServiceVerb,
        common: &launcher_config::CommonConfig,
        ctx: &BootstrapContext,
    ) -> Result<(), LauncherError> {
        let manager = ServiceDescriptor::for_current_exe(
            common,
            &ctx.config_path,
            ctx.env_path.as_deref(),
        )
        .and_then(|desc| (self.factory)(desc))
        .map_err(|e| {
            error!(severity = "crit", "Service initialization error: {}", e);
            match e {
                LauncherError::ServiceInit(_) => e,
                other => LauncherError::ServiceInit(other.to_string()),
            }
        })?;

        service::dispatch(manager.as_ref(), verb)?;
        ctx.state.transition(LifecycleState::Terminated)
    }
}

impl std::fmt::Debug for ServiceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHost").field("verb", &self.verb).finish()
    }
}

impl<A: Application> LifecycleHost<A> for ServiceHost {
    fn name(&self) -> &'static str {
        "service"
    }

    fn run(
        &self,
        app: &A,
        config: &LoadedConfig<A::Config>,
        ctx: &BootstrapContext,
        rt: &Runtime,
    ) -> Result<(), LauncherError> {
        match self.verb {
            None | Some(ServiceVerb::Run) => {
                info!("Started as a service");
                run_lifecycle(app, config, ctx, rt)
            }
            Some(verb) => self.control(verb, &config.common, ctx),
        }
    }
}

/// Pick the host for this launch.
pub fn select<A: Application>(
    interactive: bool,
    verb: Option<ServiceVerb>,
) -> Box<dyn LifecycleHost<A>> {
    if interactive && verb.is_none() {
        Box::new(DirectHost)
    } else {
        Box::new(ServiceHost::new(verb))
    }
}

/// Whether the process was started from a terminal rather than by a service manager.
pub fn is_interactive() -> bool {
    detect_interactive(|key| std::env::var(key).ok(), parent_pid())
}

/// Interactivity decision over an environment lookup and the parent PID.
pub fn detect_interactive(env: impl Fn(&str) -> Option<String>, ppid: Option<u32>) -> bool {
    if env("INVOCATION_ID").is_some_and(|v| !v.is_empty()) {
        return false;
    }
    if env("XPC_SERVICE_NAME").is_some_and(|v| !v.is_empty() && v != "0") {
        return false;
    }
    ppid != Some(1)
}

#[cfg(unix)]
fn parent_pid() -> Option<u32> {
    u32::try_from(nix::unistd::getppid().as_raw()).ok()
}

#[cfg(not(unix))]
fn parent_pid() -> Option<u32> {
    None
}

fn run_lifecycle<A: Application>(
    app: &A,
    config: &LoadedConfig<A::Config>,
    ctx: &BootstrapContext,
    rt: &Runtime,
) -> Result<(), LauncherError> {
    match rt.block_on(trapped("main", ctx.trap, runner::run(app, config, ctx))) {
        Ok(result) => result,
        Err(record) => Err(record.into()),
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
