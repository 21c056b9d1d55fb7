//! Lifecycle runner: builds the listener, supervises its helpers, runs it.

use std::sync::Arc;

use tracing::{error, info};

use launcher_config::LoadedConfig;

use crate::app::{Application, Listener, ServeOptions};
use crate::context::BootstrapContext;
use crate::diagnostics::DiagnosticsReporter;
use crate::error::LauncherError;
use crate::state::LifecycleState;
use crate::trap::spawn_trapped;
use crate::watcher;

/// Run one listener lifecycle. Returns when the listener's `start` returns.
///
/// The shutdown watcher is registered before `start` is called, so a
/// termination request that arrives during startup still stops the listener.
pub async fn run<A: Application>(
    app: &A,
    config: &LoadedConfig<A::Config>,
    ctx: &BootstrapContext,
) -> Result<(), LauncherError> {
    let common = &config.common;
    ctx.state.transition(LifecycleState::Starting)?;

    let serve = ServeOptions::from_common(common);
    let mut listener = app.new_listener(config, &serve).await.map_err(|e| {
        error!(severity = "crit", "Create listener error: {:#}", e);
        LauncherError::CreateListener(format!("{:#}", e))
    })?;

    listener.set_identity(&common.name, &common.description);
    register_auth(listener.as_mut(), config)?;

    let listener: Arc<dyn Listener> = Arc::from(listener);

    let diag_token = ctx.shutdown.child_token();
    let reporter =
        DiagnosticsReporter::new(common, ctx.diagnostics_threshold(), ctx.probe.clone());
    if reporter.is_enabled() {
        let _ = spawn_trapped("diagnostics", ctx.trap, reporter.run(diag_token.clone()));
    }

    let watcher = spawn_trapped(
        "watcher",
        ctx.trap,
        watcher::watch(listener.clone(), ctx.shutdown.clone(), ctx.state.clone()),
    );

    info!("Press Ctrl+C for exit");
    ctx.state.try_transition(LifecycleState::Running);

    let result = listener.start().await;

    watcher.abort();
    diag_token.cancel();

    match result {
        Ok(()) => {
            ctx.state.try_transition(LifecycleState::Stopping);
            ctx.state.transition(LifecycleState::Terminated)?;
            info!("{} stopped", common.name);
            Ok(())
        }
        Err(e) => {
            error!(severity = "crit", "Start listener error: {:#}", e);
            Err(LauncherError::StartListener(format!("{:#}", e)))
        }
    }
}

/// Register enabled providers in order; the first failure aborts.
fn register_auth<C>(listener: &mut dyn Listener, config: &LoadedConfig<C>) -> Result<(), LauncherError> {
    for (method, settings) in config.common.auth.enabled() {
        listener.register_auth(method, settings).map_err(|e| {
            error!(severity = "crit", "Auth provider {} registration error: {:#}", method, e);
            LauncherError::AuthRegistration {
                method: method.to_string(),
                reason: format!("{:#}", e),
            }
        })?;
        info!("Auth provider {} registered", method);
    }
    Ok(())
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
