//! Shutdown watcher: turns a termination request into one `Listener::stop`.

use std::sync::Arc;

use tracing::info;

use crate::app::Listener;
use crate::signal::ShutdownSignal;
use crate::state::{LifecycleState, StateCell};

/// Wait for a termination request, then stop the listener once and return.
pub async fn watch(listener: Arc<dyn Listener>, shutdown: ShutdownSignal, state: StateCell) {
    shutdown.cancelled().await;
    state.try_transition(LifecycleState::Stopping);
    info!("Stopping...");
    listener.stop();
}
