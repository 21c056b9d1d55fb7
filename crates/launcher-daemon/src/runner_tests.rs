use std::time::Duration;

use launcher_config::AuthMethod;

use super::*;
use crate::test_support::{validated, MockApp};

const BASIC: &str = r#"
[common]
name = "svc"
description = "test service"
min_size_for_gzip = 512
"#;

#[tokio::test]
async fn test_shutdown_during_run_stops_once() {
    let app = MockApp::default();
    let (config, ctx) = validated(BASIC);

    let shutdown = ctx.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.request_shutdown();
        shutdown.request_shutdown();
    });

    run(&app, &config, &ctx).await.unwrap();

    assert_eq!(app.journal.stops(), 1);
    assert!(app.journal.contains("start_returned"));
    assert_eq!(ctx.state.get(), LifecycleState::Terminated);
}

#[tokio::test]
async fn test_shutdown_before_start_is_not_lost() {
    let app = MockApp::default();
    let (config, ctx) = validated(BASIC);
    ctx.shutdown.request_shutdown();

    tokio::time::timeout(Duration::from_secs(5), run(&app, &config, &ctx))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(app.journal.stops(), 1);
    assert_eq!(ctx.state.get(), LifecycleState::Terminated);
}

#[tokio::test]
async fn test_wiring_order() {
    let app = MockApp::default();
    let (config, ctx) = validated(BASIC);
    ctx.shutdown.request_shutdown();

    run(&app, &config, &ctx).await.unwrap();

    let events = app.journal.events();
    assert_eq!(events[0], "new_listener:512");
    assert_eq!(events[1], "identity:svc:test service");
    assert_eq!(events[2], "start");
}

#[tokio::test]
async fn test_create_listener_failure() {
    let app = MockApp {
        fail_new_listener: true,
        ..Default::default()
    };
    let (config, ctx) = validated(BASIC);

    let err = run(&app, &config, &ctx).await.unwrap_err();
    assert!(matches!(err, LauncherError::CreateListener(ref m) if m.contains("port already in use")));
    assert_eq!(err.exit_status(), crate::error::ExitStatus::CreateListenerError);
    assert!(!app.journal.contains("start"));
}

#[tokio::test]
async fn test_auth_registered_in_order_until_failure() {
    let text = r#"
[common]
name = "svc"

[common.auth.url]
endpoint = "http://auth.local/check"

[common.auth.krb5]
keytab = "/etc/krb5.keytab"

[common.auth.jwt]
enabled = false

[common.auth.basic]
"#;
    let app = MockApp {
        fail_auth: Some(AuthMethod::Krb5),
        ..Default::default()
    };
    let (config, ctx) = validated(text);

    let err = run(&app, &config, &ctx).await.unwrap_err();
    match err {
        LauncherError::AuthRegistration { method, reason } => {
            assert_eq!(method, "krb5");
            assert!(reason.contains("unreachable"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let auth: Vec<String> = app
        .journal
        .events()
        .into_iter()
        .filter(|e| e.starts_with("auth:"))
        .collect();
    assert_eq!(auth, vec!["auth:basic", "auth:krb5"]);
    assert!(!app.journal.contains("start"));
}

#[tokio::test]
async fn test_start_failure() {
    let app = MockApp {
        fail_start: true,
        ..Default::default()
    };
    let (config, ctx) = validated(BASIC);

    let err = run(&app, &config, &ctx).await.unwrap_err();
    assert!(matches!(err, LauncherError::StartListener(_)));
    assert_eq!(err.exit_status(), crate::error::ExitStatus::StartListenerError);
}

#[tokio::test]
async fn test_requires_validated_state() {
    let app = MockApp::default();
    let (config, ctx) = validated(BASIC);
    ctx.state.transition(LifecycleState::Terminated).unwrap();

    let err = run(&app, &config, &ctx).await.unwrap_err();
    assert!(matches!(err, LauncherError::InvalidStateTransition { .. }));
    assert!(app.journal.events().is_empty());
}
