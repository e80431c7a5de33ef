//! Configuration Integration Tests
//!
//! A config file on disk drives which commands are routed.

use std::fs;

use chat_companion::storage::ConfigService;
use chat_companion::AppError;

use crate::support::{gateway, operator, run};

#[tokio::test]
async fn test_config_file_controls_routing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "command_prefixes": ["!", "/"],
            "exec": { "deadline_secs": 2, "streaming": { "Incremental": { "throttle_ms": 250 } } }
        }"#,
    )
    .unwrap();

    let config = ConfigService::load(Some(&path)).unwrap().into_config();
    assert_eq!(config.exec.deadline_secs, 2);
    let (gateway, backend) = gateway(config);

    assert!(!run(&gateway, operator(1, ".version")).await);
    assert!(run(&gateway, operator(2, "!version")).await);
    assert!(run(&gateway, operator(3, "/version")).await);
    assert!(backend.last_edit_of(2).is_some());
    assert!(backend.last_edit_of(3).is_some());
}

#[test]
fn test_ssh_enabled_without_host_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"ssh": {"enabled": true, "username": "op"}}"#).unwrap();

    let result = ConfigService::load(Some(&path));
    assert!(matches!(result, Err(AppError::Validation(msg)) if msg.contains("hostname")));
}

#[test]
fn test_defaults_written_without_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh").join("config.json");

    let service = ConfigService::load(Some(&path)).unwrap();
    let written = fs::read_to_string(service.path()).unwrap();
    assert!(written.contains("\"command_prefixes\""));
    assert!(!written.contains("bot_token"));
    assert!(!written.contains("password"));
}
