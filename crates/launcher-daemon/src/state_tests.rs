//! Tests for lifecycle state transitions.

use super::*;

#[test]
fn test_state_conversion() {
    assert_eq!(LifecycleState::from(0), LifecycleState::Init);
    assert_eq!(LifecycleState::from(4), LifecycleState::Running);
    assert_eq!(LifecycleState::from(6), LifecycleState::Terminated);
    assert_eq!(LifecycleState::from(99), LifecycleState::Failed);
}

#[test]
fn test_happy_path() {
    let cell = StateCell::new();
    for to in [
        LifecycleState::ConfigLoaded,
        LifecycleState::Validated,
        LifecycleState::Starting,
        LifecycleState::Running,
        LifecycleState::Stopping,
        LifecycleState::Terminated,
    ] {
        cell.transition(to).unwrap();
    }
    assert_eq!(cell.get(), LifecycleState::Terminated);
    assert!(cell.failure().is_none());
}

#[test]
fn test_skipping_states_is_rejected() {
    let cell = StateCell::new();
    let err = cell.transition(LifecycleState::Running).unwrap_err();
    assert!(matches!(
        err,
        LauncherError::InvalidStateTransition {
            from: LifecycleState::Init,
            to: LifecycleState::Running
        }
    ));
    assert_eq!(cell.get(), LifecycleState::Init);
}

#[test]
fn test_stop_during_startup() {
    let cell = StateCell::new();
    cell.transition(LifecycleState::ConfigLoaded).unwrap();
    cell.transition(LifecycleState::Validated).unwrap();
    cell.transition(LifecycleState::Starting).unwrap();
    cell.transition(LifecycleState::Stopping).unwrap();
    assert!(!cell.try_transition(LifecycleState::Running));
    cell.transition(LifecycleState::Terminated).unwrap();
}

#[test]
fn test_control_verb_terminates_from_validated() {
    let cell = StateCell::new();
    cell.transition(LifecycleState::ConfigLoaded).unwrap();
    cell.transition(LifecycleState::Validated).unwrap();
    cell.transition(LifecycleState::Terminated).unwrap();
}

#[test]
fn test_fail_records_first_status() {
    let cell = StateCell::new();
    cell.transition(LifecycleState::ConfigLoaded).unwrap();
    cell.fail(ExitStatus::ConfigErrors);
    cell.fail(ExitStatus::StartListenerError);

    assert_eq!(cell.get(), LifecycleState::Failed);
    assert_eq!(cell.failure(), Some(ExitStatus::ConfigErrors));
}

#[test]
fn test_terminal_states_are_final() {
    let cell = StateCell::new();
    cell.fail(ExitStatus::MissingConfigFile);
    assert!(cell.get().is_terminal());
    assert!(!cell.try_transition(LifecycleState::ConfigLoaded));
    assert!(!cell.try_transition(LifecycleState::Failed));
}

#[test]
fn test_clones_share_state() {
    let cell = StateCell::new();
    let cloned = cell.clone();
    cell.transition(LifecycleState::ConfigLoaded).unwrap();
    assert_eq!(cloned.get(), LifecycleState::ConfigLoaded);
}

#[test]
fn test_state_display() {
    assert_eq!(LifecycleState::ConfigLoaded.to_string(), "config_loaded");
    assert_eq!(LifecycleState::Stopping.to_string(), "stopping");
}
