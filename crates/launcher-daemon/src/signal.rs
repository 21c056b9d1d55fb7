//! Shutdown requests and OS signal handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::LauncherError;

/// Process-wide termination request.
///
/// Cancellation is level-triggered: a request made before anybody waits is
/// still observed by later waiters.
#[derive(Clone)]
pub struct ShutdownSignal {
    token: CancellationToken,
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown. Returns `true` for the first request only.
    pub fn request_shutdown(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        if first {
            debug!("Shutdown requested");
        }
        self.token.cancel();
        first
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// A token cancelled on shutdown that can also be cancelled on its own.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Interruptible sleep: `true` when the full duration elapsed,
    /// `false` when shutdown was requested first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        sleep_or_cancel(&self.token, duration).await
    }

    /// Route SIGTERM and SIGINT to [`ShutdownSignal::request_shutdown`].
    /// Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install_os_handlers(&self) -> Result<(), LauncherError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| LauncherError::SignalSetup(e.to_string()))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| LauncherError::SignalSetup(e.to_string()))?;
        let mut sighup =
            signal(SignalKind::hangup()).map_err(|e| LauncherError::SignalSetup(e.to_string()))?;

        let handler = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM");
                        handler.request_shutdown();
                    }
                    Some(()) = sigint.recv() => {
                        info!("Received SIGINT");
                        handler.request_shutdown();
                    }
                    Some(()) = sighup.recv() => {
                        info!("Received SIGHUP, ignored");
                    }
                    else => break,
                }
            }
        });

        debug!("OS signal handlers installed (SIGTERM, SIGINT, SIGHUP)");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn install_os_handlers(&self) -> Result<(), LauncherError> {
        let handler = self.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C");
                handler.request_shutdown();
            }
        });

        debug!("OS signal handlers installed (Ctrl+C only)");
        Ok(())
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("requested", &self.is_shutdown_requested())
            .finish()
    }
}

/// Sleep for `duration` unless `token` is cancelled first.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
