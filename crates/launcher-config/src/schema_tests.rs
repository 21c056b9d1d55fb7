use super::*;

#[test]
fn test_default_common_config() {
    let config = CommonConfig::default();
    assert_eq!(config.name, "launcher");
    assert_eq!(config.log_level, "INFO");
    assert_eq!(config.secret_keys, vec!["password".to_string()]);
    assert!(config.mem_stats_period().is_none());
    assert!(config.log_dir().is_none());
}

#[test]
fn test_deserialize_empty_table_uses_defaults() {
    let config: CommonConfig = toml::from_str("").unwrap();
    assert_eq!(config.log_rotation(), Some(LogRotation::Daily));
    assert_eq!(config.log_max_files, 30);
    assert!(config.log_local_time);
}

#[test]
fn test_mem_stats_period() {
    let mut config = CommonConfig::default();
    config.mem_stats_period = 5;
    assert_eq!(config.mem_stats_period(), Some(Duration::from_secs(5)));

    config.mem_stats_period = -3;
    assert!(config.mem_stats_period().is_none());
}

#[test]
fn test_mem_stats_level_falls_back_to_debug() {
    let mut config = CommonConfig::default();
    config.mem_stats_level = "NOTICE".to_string();
    assert_eq!(config.mem_stats_level(), tracing::Level::INFO);

    config.mem_stats_level = "chatty".to_string();
    assert_eq!(config.mem_stats_level(), tracing::Level::DEBUG);
}

#[test]
fn test_log_rotation_parse() {
    assert_eq!(LogRotation::parse("Hourly"), Some(LogRotation::Hourly));
    assert_eq!(LogRotation::parse("never"), Some(LogRotation::Never));
    assert_eq!(LogRotation::parse("weekly"), None);
}

#[test]
fn test_log_dir_expands_tilde() {
    let config = CommonConfig {
        log_dir: "~/logs".to_string(),
        ..Default::default()
    };
    let dir = config.log_dir().unwrap();
    assert!(!dir.to_string_lossy().starts_with('~'));
    assert!(dir.ends_with("logs"));
}

#[test]
fn test_auth_enabled_in_registration_order() {
    let content = r#"
        [auth.url]
        endpoint = "https://auth.example.com"

        [auth.basic]
        realm = "demo"

        [auth.jwt]
        enabled = false
    "#;
    let config: CommonConfig = toml::from_str(content).unwrap();
    let methods: Vec<AuthMethod> = config.auth.enabled().map(|(m, _)| m).collect();
    assert_eq!(methods, vec![AuthMethod::Basic, AuthMethod::Url]);

    let basic = config.auth.get(AuthMethod::Basic).unwrap();
    assert_eq!(basic.options.get("realm").and_then(|v| v.as_str()), Some("demo"));
}

#[test]
fn test_auth_method_display() {
    assert_eq!(AuthMethod::Keycloak.to_string(), "keycloak");
    assert_eq!(AuthMethod::Krb5.to_string(), "krb5");
}

#[test]
fn test_masked_keys_include_plain_basic_users() {
    let config: CommonConfig = toml::from_str(
        "secret_keys = [\"password\", \"token\"]\n\
         [auth.basic.users]\n\
         admin = \"hunter2\"\n\
         ops = { password = \"pw\" }\n",
    )
    .unwrap();

    let keys = config.masked_keys();
    assert_eq!(keys, vec!["password", "token", "admin"]);
}

#[test]
fn test_masked_keys_without_basic_auth() {
    let config = CommonConfig::default();
    assert_eq!(config.masked_keys(), vec!["password"]);
}
