//! Dispatch Integration Tests
//!
//! Operator commands through the gateway: routing, presence, failure
//! reporting and capture logs.

use chat_companion::services::remote::gateway::NO_LONGER_AFK;
use chat_companion::AppConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::support::{gateway, operator, run, stranger, CHAT};

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_ping_reports_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
            .await
            .unwrap();
    });

    let mut config = AppConfig::default();
    config.ping_url = format!("http://{}/", addr);
    let (gateway, backend) = gateway(config);

    assert!(run(&gateway, operator(10, ".ping")).await);
    let text = backend.last_edit_of(10).unwrap();
    assert!(text.starts_with("Ping time was: "));
    assert!(text.ends_with("ms"));
}

#[tokio::test]
async fn test_custom_prefix() {
    let mut config = AppConfig::default();
    config.command_prefixes = vec!['!'];
    let (gateway, backend) = gateway(config);

    assert!(!run(&gateway, operator(10, ".version")).await);
    assert!(run(&gateway, operator(11, "!version")).await);
    assert!(backend.last_edit_of(11).unwrap().contains("Bot Version"));
}

#[tokio::test]
async fn test_strangers_never_run_commands() {
    let (gateway, backend) = gateway(AppConfig::default());
    assert!(!run(&gateway, stranger(10, ".term echo pwned")).await);
    assert!(!run(&gateway, stranger(11, ".afk")).await);
    assert!(backend.calls().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_exec_with_shell_interpreter() {
    let mut config = AppConfig::default();
    config.exec.interpreter = "sh".to_string();
    let (gateway, backend) = gateway(config);

    assert!(run(&gateway, operator(10, ".exec echo $((1 + 1))")).await);
    let text = backend.last_edit_of(10).unwrap();
    assert!(text.contains("<b>Result:</b>\n<pre>2\n</pre>"));
}

#[tokio::test]
async fn test_plugins_lists_modules() {
    let (gateway, backend) = gateway(AppConfig::default());
    assert!(run(&gateway, operator(10, ".plugins")).await);
    let sent = backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, CHAT);
    assert!(sent[0].1.contains("<code>terminals</code>"));
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test]
async fn test_afk_cycle() {
    let mut config = AppConfig::default();
    config.telegram.afk_auto_reply = true;
    let (gateway, backend) = gateway(config);

    assert!(run(&gateway, operator(10, ".afk out for lunch")).await);
    assert!(gateway.context().presence.is_away());
    assert_eq!(
        backend.last_edit_of(10).as_deref(),
        Some("<b>I will be afk for a while.</b>\n<i>Reason:</i> out for lunch")
    );

    let mut dm = stranger(20, "are you there?");
    dm.is_private = true;
    assert!(!run(&gateway, dm).await);
    let sent = backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].2, Some(20));
    assert!(sent[0].1.contains("out for lunch"));

    assert!(!run(&gateway, operator(30, "I'm back")).await);
    assert!(!gateway.context().presence.is_away());
    assert_eq!(backend.sent().last().unwrap().1, NO_LONGER_AFK);
}

#[tokio::test]
async fn test_command_while_away_clears_presence_first() {
    let (gateway, backend) = gateway(AppConfig::default());
    gateway.context().presence.set_away("");

    assert!(run(&gateway, operator(10, ".version")).await);
    assert!(!gateway.context().presence.is_away());
    assert_eq!(backend.sent()[0].1, NO_LONGER_AFK);
    assert!(backend.last_edit_of(10).is_some());
}

// ============================================================================
// Failures
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_failure_reported_and_captured_in_debug() {
    let logs = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.debug_mode = true;
    config.logs_dir = logs.path().to_path_buf();
    config.exec.interpreter = "/definitely/not/an/interpreter".to_string();
    let (gateway, backend) = gateway(config);

    assert!(run(&gateway, operator(10, ".exec print(1)")).await);

    let sent = backend.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.starts_with("<b>Error:</b> Command error: Failed to spawn"));
    assert_eq!(sent[0].2, Some(10));

    let files: Vec<_> = std::fs::read_dir(logs.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("_Command_exec.log"));
}
