#![allow(missing_docs)]
use s2_cli::config::{format_sections, CliConfig, ConfigManager};
use s2_sdk::AppendRetryPolicy;
use std::time::Duration;

#[test]
fn shipped_defaults_match_built_in_defaults() {
    let shipped: CliConfig =
        toml::from_str(include_str!("../config/default.toml")).expect("parse default.toml");
    assert_eq!(shipped, CliConfig::default());
}

#[test]
fn missing_file_loads_defaults() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let manager = ConfigManager::load_with_path(temp_dir.path().join("absent.toml"))
        .expect("load default config");
    assert_eq!(manager.config(), &CliConfig::default());
}

#[test]
fn partial_file_keeps_remaining_defaults() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "[append]\nretry_policy = \"no-side-effects\"\n")
        .expect("write config");

    let manager = ConfigManager::load_with_path(&config_path).expect("load config");
    assert_eq!(manager.config().append.retry_policy, "no-side-effects");
    assert_eq!(manager.config().connection.max_retries, 3);
    assert!(manager.config().read.heartbeats);
}

#[test]
fn setting_values_persists() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let config_path = temp_dir.path().join("s2").join("config.toml");

    let mut manager = ConfigManager::load_with_path(&config_path).expect("load default config");
    manager
        .set("connection.max_retries", "7")
        .expect("set retries");
    manager.set("read.heartbeats", "off").expect("set heartbeats");
    manager
        .set("append.retry_policy", "no-side-effects")
        .expect("set policy");
    manager.save().expect("save config");

    let reloaded = ConfigManager::load_with_path(&config_path).expect("reload config");
    assert_eq!(reloaded.config().connection.max_retries, 7);
    assert!(!reloaded.config().read.heartbeats);
    assert_eq!(
        reloaded.get("append.retry_policy").as_deref(),
        Some("no-side-effects")
    );
}

#[test]
fn invalid_values_are_rejected() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut manager =
        ConfigManager::load_with_path(temp_dir.path().join("config.toml")).expect("load");

    assert!(manager.set("connection.cloud", "azure").is_err());
    assert!(manager.set("append.retry_policy", "sometimes").is_err());
    assert!(manager.set("connection.max_retries", "-1").is_err());
    assert!(manager.set("read.heartbeats", "maybe").is_err());
    assert!(manager.set("storage.path", "/tmp").is_err());
    assert_eq!(manager.config(), &CliConfig::default());
}

#[test]
fn access_token_is_redacted() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut manager =
        ConfigManager::load_with_path(temp_dir.path().join("config.toml")).expect("load");

    assert_eq!(manager.get("connection.access_token").as_deref(), Some(""));
    manager
        .set("connection.access_token", "secret-token")
        .expect("set token");
    assert_eq!(
        manager.get("connection.access_token").as_deref(),
        Some("********")
    );
    assert!(format_sections(&manager)
        .iter()
        .all(|line| !line.contains("secret-token")));
    assert!(manager.get("connection.unknown").is_none());
}

#[test]
fn client_config_requires_a_token() {
    let config = CliConfig::default();
    assert!(config.client_config(None).is_err());
    assert!(config.client_config(Some("")).is_err());
}

#[test]
fn client_config_carries_settings() {
    let mut config = CliConfig::default();
    config.connection.access_token = "stored".to_string();
    config.connection.max_retries = 5;
    config.connection.request_timeout_secs = 2;
    config.append.retry_policy = "no-side-effects".to_string();

    let client_config = config.client_config(Some("override")).expect("client config");
    assert_eq!(client_config.token, "override");
    assert_eq!(client_config.max_retries, 5);
    assert_eq!(client_config.request_timeout, Duration::from_secs(2));
    assert_eq!(
        client_config.append_retry_policy,
        AppendRetryPolicy::NoSideEffects
    );
    assert!(client_config.user_agent.starts_with("s2-cli/"));

    let stored = config.client_config(None).expect("client config");
    assert_eq!(stored.token, "stored");
}
