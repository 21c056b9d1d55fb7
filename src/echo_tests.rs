use super::*;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use launcher_config::ConfigLoader;
use tower::ServiceExt;

fn load(text: &str) -> LoadedConfig<EchoConfig> {
    ConfigLoader::load_str::<EchoConfig>(text).unwrap()
}

fn listener(serve: ServeOptions) -> EchoListener {
    EchoListener {
        addr: "127.0.0.1:0".parse().unwrap(),
        name: "echo".to_string(),
        description: "Echo service".to_string(),
        greeting: "Hi there".to_string(),
        users: None,
        serve,
        shutdown: CancellationToken::new(),
    }
}

fn basic_settings(users: &str) -> AuthMethodConfig {
    let text = format!("[common]\n[common.auth.basic.users]\n{}\n", users);
    let config = load(&text);
    config.common.auth.basic.unwrap()
}

async fn send(router: Router, request: axum::http::Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn test_check_config_accepts_defaults() {
    let config = load("[common]\n");
    assert_eq!(config.app.echo.bind, "127.0.0.1:8080");
    assert!(EchoApp.check_config(&config).is_ok());
}

#[test]
fn test_check_config_rejects_bad_bind() {
    let config = load("[common]\n[echo]\nbind = \"localhost\"\n");
    let err = EchoApp.check_config(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("echo.bind"));
}

#[test]
fn test_check_config_rejects_empty_greeting() {
    let config = load("[common]\n[echo]\ngreeting = \"  \"\n");
    let err = EchoApp.check_config(&config).unwrap_err();
    assert!(err.to_string().contains("greeting"));
}

#[test]
fn test_parse_basic_header() {
    let header = format!("Basic {}", STANDARD.encode("alice:open:sesame"));
    assert_eq!(
        parse_basic(&header),
        Some(("alice".to_string(), "open:sesame".to_string()))
    );
    assert_eq!(parse_basic("Bearer abc"), None);
    assert_eq!(parse_basic("Basic !!!"), None);
}

#[test]
fn test_parse_users_both_forms() {
    let settings = basic_settings("alice = \"one\"\nbob = { password = \"two\" }");
    let users = parse_users(&settings).unwrap();
    assert_eq!(users.get("alice").map(String::as_str), Some("one"));
    assert_eq!(users.get("bob").map(String::as_str), Some("two"));
}

#[test]
fn test_parse_users_requires_table() {
    let config = load("[common]\n[common.auth.basic]\nrealm = \"x\"\n");
    let settings = config.common.auth.basic.unwrap();
    assert!(parse_users(&settings).is_err());
}

#[test]
fn test_unsupported_auth_method() {
    let mut l = listener(ServeOptions::default());
    let config = load("[common]\n[common.auth.jwt]\nsecret = \"x\"\n");
    let err = l
        .register_auth(AuthMethod::Jwt, config.common.auth.jwt.as_ref().unwrap())
        .unwrap_err();
    assert!(err.to_string().contains("jwt"));
}

#[tokio::test]
async fn test_greeting_and_echo() {
    let l = listener(ServeOptions::default());

    let response = send(l.router(), axum::http::Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Hi there\n");

    let response = send(
        l.router(),
        axum::http::Request::post("/echo").body(Body::from("ping")).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ping");
}

#[tokio::test]
async fn test_health_reports_identity() {
    let l = listener(ServeOptions {
        pretty_json: true,
        ..Default::default()
    });
    let response = send(
        l.router(),
        axum::http::Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("\"name\": \"echo\""));
    assert!(text.contains('\n'));
}

#[tokio::test]
async fn test_basic_auth_guards_routes() {
    let mut l = listener(ServeOptions::default());
    l.register_auth(AuthMethod::Basic, &basic_settings("alice = { password = \"pw\" }"))
        .unwrap();

    let anonymous = send(l.router(), axum::http::Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert!(anonymous.headers().contains_key(WWW_AUTHENTICATE));

    let wrong = send(
        l.router(),
        axum::http::Request::get("/")
            .header(AUTHORIZATION, format!("Basic {}", STANDARD.encode("alice:nope")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let right = send(
        l.router(),
        axum::http::Request::get("/")
            .header(AUTHORIZATION, format!("Basic {}", STANDARD.encode("alice:pw")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(right.status(), StatusCode::OK);

    let health = send(
        l.router(),
        axum::http::Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_compression_threshold() {
    let l = listener(ServeOptions {
        min_size_for_gzip: 512,
        ..Default::default()
    });

    let request = |body: String| {
        axum::http::Request::post("/echo")
            .header(ACCEPT_ENCODING, "gzip")
            .body(Body::from(body))
            .unwrap()
    };

    let large = send(l.router(), request("x".repeat(4096))).await;
    assert_eq!(
        large.headers().get(CONTENT_ENCODING).map(|v| v.as_bytes()),
        Some(&b"gzip"[..])
    );

    let small = send(l.router(), request("x".repeat(16))).await;
    assert!(small.headers().get(CONTENT_ENCODING).is_none());
}

#[tokio::test]
async fn test_start_returns_after_stop() {
    let l = Arc::new(listener(ServeOptions::default()));
    let runner = l.clone();
    let handle = tokio::spawn(async move { runner.start().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    l.stop();
    l.stop();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_stop_before_start() {
    let l = listener(ServeOptions::default());
    l.stop();
    tokio::time::timeout(Duration::from_secs(5), l.start())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_new_listener_uses_config() {
    let config = load("[common]\n[echo]\nbind = \"127.0.0.1:0\"\ngreeting = \"Yo\"\n");
    let serve = ServeOptions {
        min_size_for_gzip: 100,
        pretty_json: false,
    };
    assert!(EchoApp.new_listener(&config, &serve).await.is_ok());

    let bad = load("[common]\n[echo]\nbind = \"nowhere\"\n");
    assert!(EchoApp.new_listener(&bad, &serve).await.is_err());
}
