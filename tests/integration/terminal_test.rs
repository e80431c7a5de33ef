//! Terminal Integration Tests
//!
//! `.term` through the gateway with real subprocesses: live edits, the
//! deadline, the size ceiling and file uploads.

#![cfg(unix)]

use chat_companion::services::exec::{CONNECTING_TEXT, OUTPUT_FILE_NAME};
use chat_companion::{AppConfig, StreamingPolicy};

use crate::support::{gateway, operator, run};

fn config(deadline_secs: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.exec.deadline_secs = deadline_secs;
    config
}

#[tokio::test]
async fn test_term_edits_one_live_message() {
    let (gateway, backend) = gateway(config(5));
    assert!(run(&gateway, operator(10, ".term echo one; echo two")).await);

    let edits = backend.edits();
    assert_eq!(edits[0].1, CONNECTING_TEXT);
    assert!(edits.iter().all(|(id, _)| *id == 10));
    assert!(backend.sent().is_empty());

    let last = backend.last_edit_of(10).unwrap();
    assert!(last.contains("<code>echo one; echo two</code>"));
    assert!(last.ends_with("<pre>one\ntwo\n</pre>"));
}

#[tokio::test]
async fn test_term_stderr_follows_stdout() {
    let (gateway, backend) = gateway(config(5));
    assert!(run(&gateway, operator(10, ".term echo err >&2; echo out")).await);
    let last = backend.last_edit_of(10).unwrap();
    assert!(last.ends_with("<pre>out\nerr\n</pre>"));
}

#[tokio::test]
async fn test_term_buffered_policy_single_final_edit() {
    let mut config = config(5);
    config.exec.streaming = StreamingPolicy::Buffered;
    let (gateway, backend) = gateway(config);
    assert!(run(&gateway, operator(10, ".term printf 'a\\nb\\nc\\n'")).await);

    let edits = backend.edits();
    assert_eq!(edits.len(), 2);
    assert!(edits[1].1.ends_with("<pre>a\nb\nc\n</pre>"));
}

#[tokio::test]
async fn test_term_deadline() {
    let (gateway, backend) = gateway(config(1));
    let started = std::time::Instant::now();
    assert!(run(&gateway, operator(10, ".term echo tick; sleep 30")).await);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));

    let last = backend.last_edit_of(10).unwrap();
    assert!(last.contains("tick"));
    assert!(last.ends_with("<b>Process killed:</b> <code>Time limit reached</code>"));
}

#[tokio::test]
async fn test_term_large_output_goes_to_file() {
    let (gateway, backend) = gateway(config(5));
    assert!(run(&gateway, operator(10, ".term seq 1 5000")).await);

    let files = backend.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, OUTPUT_FILE_NAME);
    assert_eq!(
        files[0].caption.as_deref(),
        Some("Process killed: Message too long")
    );
    let content = String::from_utf8(files[0].data.clone()).unwrap();
    assert!(content.starts_with("1\n2\n3\n"));

    assert_eq!(
        backend.last_edit_of(10).as_deref(),
        Some("<code>seq 1 5000</code>")
    );
    for (_, text) in backend.edits() {
        assert!(text.chars().count() <= 4096 + 64);
    }
}

#[tokio::test]
async fn test_edited_trigger_reruns_term() {
    let (gateway, backend) = gateway(config(5));
    assert!(run(&gateway, operator(10, ".term echo first")).await);

    let mut edited = operator(10, ".term echo second");
    edited.is_edit = true;
    assert!(run(&gateway, edited).await);
    assert!(backend.last_edit_of(10).unwrap().ends_with("<pre>second\n</pre>"));
}

#[tokio::test]
async fn test_upload_folder_as_zip() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("reports");
    std::fs::create_dir(&folder).unwrap();
    std::fs::write(folder.join("a.txt"), "alpha").unwrap();

    let (gateway, backend) = gateway(config(5));
    let text = format!(".upload {}", folder.display());
    assert!(run(&gateway, operator(10, &text)).await);

    let files = backend.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "reports.zip");
    assert_eq!(backend.deleted(), vec![10]);
}
