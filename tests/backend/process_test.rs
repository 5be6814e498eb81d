//! End-to-end tests against shell-script backends.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pacman_client::backend::{
    BackendClient, BackendOperation, ErrorKind, ListInstalled, ListOrphans, StreamCallbacks,
    StreamOutcome,
};
use pacman_client::config::ClientConfig;
use serde_json::Value;
use tempfile::TempDir;

fn backend(dir: &TempDir, body: &str) -> String {
    let path = dir.path().join("backend");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path_string(&path)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn client(backend_path: String) -> BackendClient {
    BackendClient::new(&ClientConfig {
        backend_path,
        timeout_secs: 1,
        terminate_grace_secs: 1,
        escalation: Vec::new(),
        escalate_queries: false,
    })
}

#[tokio::test]
async fn query_reads_stdout_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = backend(&dir, r#"echo '{"orphans":[],"total_size":0}'"#);

    let response = client(path).query(&ListOrphans).await.unwrap();

    assert!(response.orphans.is_empty());
    assert_eq!(response.total_size, 0);
}

#[tokio::test]
async fn positional_arguments_reach_the_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = backend(
        &dir,
        r#"printf '{"argc":%d,"first":"%s","fifth":"%s"}' "$#" "$1" "$5""#,
    );

    let value: Value = client(path)
        .invoke_command(&ListInstalled::default().command())
        .await
        .unwrap();

    assert_eq!(value["argc"], 8);
    assert_eq!(value["first"], "list-installed");
    assert_eq!(value["fifth"], "all");
}

#[tokio::test]
async fn stderr_text_is_classified_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = backend(
        &dir,
        "echo 'error: failed to init transaction (unable to lock database)' >&2\nexit 1",
    );

    let err = client(path)
        .invoke::<Value, _, _>("check-updates", Vec::<String>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::DatabaseLocked);
    assert!(err.message.contains("unable to lock database"));
}

#[tokio::test]
async fn missing_binary_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_string(&dir.path().join("does-not-exist"));

    let err = client(path)
        .invoke::<Value, _, _>("check-updates", Vec::<String>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn slow_backend_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = backend(&dir, "exec sleep 30");
    let started = Instant::now();

    let err = client(path)
        .invoke::<Value, _, _>("check-updates", Vec::<String>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn stream_merges_stderr_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = backend(
        &dir,
        r#"echo '{"type":"event","event":"checking_dependencies"}'
echo 'warning: from stderr' >&2
printf '{"type":"complete","success":true}'"#,
    );
    let data = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&data);

    let outcome = client(path)
        .start_stream(
            "sync-database",
            ["false"],
            StreamCallbacks::new().on_data(move |text| sink.lock().unwrap().push_str(text)),
        )
        .finished()
        .await;

    assert_eq!(outcome, StreamOutcome::Completed);
    let data = data.lock().unwrap();
    assert!(data.contains("checking_dependencies\n"));
    assert!(data.contains("warning: from stderr\n"));
}

#[tokio::test]
async fn stream_cancel_stops_the_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = backend(
        &dir,
        r#"echo '{"type":"log","level":"info","message":"starting"}'
exec sleep 30"#,
    );
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let started = Instant::now();

    let handle = client(path).start_stream(
        "upgrade",
        [""],
        StreamCallbacks::new().on_error(move |m| sink.lock().unwrap().push(m.to_string())),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.cancel();
    let outcome = handle.finished().await;

    assert_eq!(
        outcome,
        StreamOutcome::Failed("Backend process terminated (cancelled)".to_string())
    );
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn stream_cancel_does_not_wait_for_orphaned_children() {
    // Without exec the sleep outlives the shell and keeps stdout open.
    let dir = tempfile::tempdir().unwrap();
    let path = backend(
        &dir,
        r#"echo '{"type":"log","level":"info","message":"starting"}'
sleep 6"#,
    );
    let started = Instant::now();

    let handle = client(path).start_stream("upgrade", [""], StreamCallbacks::new());
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.cancel();
    let outcome = handle.finished().await;

    assert_eq!(
        outcome,
        StreamOutcome::Failed("Backend process terminated (cancelled)".to_string())
    );
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn stream_completes_while_background_child_holds_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = backend(
        &dir,
        r#"sleep 6 &
printf '{"type":"complete","success":true}\n'"#,
    );
    let started = Instant::now();

    let outcome = client(path)
        .start_stream("sync-database", ["false"], StreamCallbacks::new())
        .finished()
        .await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert!(started.elapsed() < Duration::from_secs(3));
}
