//! Process lifecycle state machine.
//!
//! ```text
//! Init -> ConfigLoaded -> Validated -> Starting -> Running -> Stopping -> Terminated
//!                            |             |                     ^
//!                            |             +---------------------+   (stop during startup)
//!                            +--> Terminated                         (control verbs, no listener)
//!
//! any non-terminal state -> Failed
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{ExitStatus, LauncherError};

/// Lifecycle state of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Init = 0,
    ConfigLoaded = 1,
    Validated = 2,
    Starting = 3,
    Running = 4,
    Stopping = 5,
    Terminated = 6,
    Failed = 7,
}

impl From<u8> for LifecycleState {
    fn from(v: u8) -> Self {
        match v {
            0 => LifecycleState::Init,
            1 => LifecycleState::ConfigLoaded,
            2 => LifecycleState::Validated,
            3 => LifecycleState::Starting,
            4 => LifecycleState::Running,
            5 => LifecycleState::Stopping,
            6 => LifecycleState::Terminated,
            _ => LifecycleState::Failed,
        }
    }
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Terminated | LifecycleState::Failed)
    }

    fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;

        if to == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, to),
            (Init, ConfigLoaded)
                | (ConfigLoaded, Validated)
                | (Validated, Starting)
                | (Validated, Terminated)
                | (Starting, Running)
                | (Starting, Stopping)
                | (Running, Stopping)
                | (Running, Terminated)
                | (Stopping, Terminated)
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Init => write!(f, "init"),
            LifecycleState::ConfigLoaded => write!(f, "config_loaded"),
            LifecycleState::Validated => write!(f, "validated"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
            LifecycleState::Terminated => write!(f, "terminated"),
            LifecycleState::Failed => write!(f, "failed"),
        }
    }
}

const NO_FAILURE: u8 = 0;

struct Inner {
    state: AtomicU8,
    failure: AtomicU8,
}

/// Shared, lock-free lifecycle state plus the failure status of a failed run.
#[derive(Clone)]
pub struct StateCell {
    inner: Arc<Inner>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(LifecycleState::Init as u8),
                failure: AtomicU8::new(NO_FAILURE),
            }),
        }
    }

    /// Current state.
    pub fn get(&self) -> LifecycleState {
        LifecycleState::from(self.inner.state.load(Ordering::SeqCst))
    }

    /// Exit status recorded by [`StateCell::fail`], if any.
    pub fn failure(&self) -> Option<ExitStatus> {
        match self.inner.failure.load(Ordering::SeqCst) {
            NO_FAILURE => None,
            code => exit_status_from_code(code),
        }
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub fn transition(&self, to: LifecycleState) -> Result<(), LauncherError> {
        let mut current = self.inner.state.load(Ordering::SeqCst);
        loop {
            let from = LifecycleState::from(current);
            if !from.can_transition_to(to) {
                return Err(LauncherError::InvalidStateTransition { from, to });
            }
            match self.inner.state.compare_exchange(
                current,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    debug!("Lifecycle: {} -> {}", from, to);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Like [`StateCell::transition`] but ignores a disallowed move.
    /// Returns whether the state changed.
    pub fn try_transition(&self, to: LifecycleState) -> bool {
        self.transition(to).is_ok()
    }

    /// Enter the failed terminal state with the given exit status.
    /// The first recorded failure wins.
    pub fn fail(&self, status: ExitStatus) {
        let _ = self.inner.failure.compare_exchange(
            NO_FAILURE,
            status.code(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.try_transition(LifecycleState::Failed);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("state", &self.get())
            .field("failure", &self.failure())
            .finish()
    }
}

fn exit_status_from_code(code: u8) -> Option<ExitStatus> {
    let status = match code {
        100 => ExitStatus::Version,
        101 => ExitStatus::MissingConfigFile,
        102 => ExitStatus::IncorrectConfigFile,
        103 => ExitStatus::ConfigIncorrect,
        104 => ExitStatus::ConfigErrors,
        105 => ExitStatus::CreateListenerError,
        106 => ExitStatus::StartListenerError,
        107 => ExitStatus::ServiceInitializationError,
        108 => ExitStatus::ServiceError,
        109 => ExitStatus::AccessDenied,
        _ => return None,
    };
    Some(status)
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
