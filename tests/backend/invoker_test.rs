//! Tests for one-shot command invocation.

use std::sync::Arc;
use std::time::Duration;

use pacman_client::backend::{
    AddIgnored, BackendClient, BackendOperation, ErrorKind, GetRebootStatus, Invoker,
    ListOrphans, OutputMode, Privilege, ProcessFailure, REASON_TIMEOUT,
};
use pacman_client::config::ClientConfig;
use serde_json::{json, Value};

use super::fake::{Exit, Script, ScriptedSpawner};

const BACKEND: &str = "/usr/libexec/test-backend";

fn client(spawner: &ScriptedSpawner) -> BackendClient {
    let config = ClientConfig {
        backend_path: BACKEND.to_string(),
        ..ClientConfig::default()
    };
    BackendClient::with_spawner(&config, Arc::new(spawner.clone()))
}

fn invoker(spawner: &ScriptedSpawner, timeout: Duration) -> Invoker {
    Invoker::new(Arc::new(spawner.clone()), BACKEND).with_timeout(timeout)
}

#[tokio::test]
async fn success_payload_is_returned_unchanged() {
    let spawner = ScriptedSpawner::new(Script::output(&[
        r#"{"packages":[{"name":"bash"},"#,
        r#"{"name":"zsh"}],"total":2}"#,
    ]));

    let value: Value = client(&spawner)
        .invoke("list-installed", ["0", "50"])
        .await
        .unwrap();

    assert_eq!(
        value,
        json!({"packages": [{"name": "bash"}, {"name": "zsh"}], "total": 2})
    );

    let requests = spawner.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].argv, [BACKEND, "list-installed", "0", "50"]);
    assert_eq!(requests[0].privilege, Privilege::Optional);
    assert_eq!(requests[0].mode, OutputMode::CaptureStderr);
}

#[tokio::test]
async fn empty_output_is_internal_error_naming_command() {
    let spawner = ScriptedSpawner::new(Script::output(&["  \n"]));

    let err = client(&spawner)
        .invoke::<Value, _, _>("list-installed", Vec::<String>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InternalError);
    assert!(err.message.contains("empty response"));
    assert!(err.message.contains("list-installed"));
}

#[tokio::test]
async fn structured_envelope_is_authoritative() {
    let spawner = ScriptedSpawner::new(Script::output(&[
        r#"{"code":"not_found","message":"request timed out","details":"pkg: foo"}"#,
    ]));

    let err = client(&spawner)
        .invoke::<Value, _, _>("local-package-info", ["foo"])
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.message, "request timed out");
    assert_eq!(err.details.as_deref(), Some("pkg: foo"));
}

#[tokio::test]
async fn envelope_on_failed_exit_wins_over_classification() {
    let spawner = ScriptedSpawner::new(
        Script::output(&[r#"{"code":"database_locked","message":"Database is busy"}"#]).exit(
            Exit::Failure(ProcessFailure {
                message: Some("connection reset".to_string()),
                exit_code: Some(1),
                problem: None,
            }),
        ),
    );

    let err = client(&spawner)
        .invoke::<Value, _, _>("check-updates", Vec::<String>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::DatabaseLocked);
    assert_eq!(err.message, "Database is busy");
}

#[tokio::test]
async fn failure_text_is_classified() {
    let spawner = ScriptedSpawner::new(Script::output(&[]).exit(Exit::Failure(
        ProcessFailure::from_message("error: failed to init transaction (unable to lock database)"),
    )));

    let err = client(&spawner)
        .invoke::<Value, _, _>("sync-package-info", ["vim"])
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::DatabaseLocked);
    assert!(err
        .message
        .starts_with("Backend command 'sync-package-info' failed: "));
}

#[tokio::test]
async fn failure_without_text_reports_exit_code() {
    let spawner = ScriptedSpawner::new(Script::output(&[]).exit(Exit::Failure(ProcessFailure {
        message: None,
        exit_code: Some(3),
        problem: None,
    })));

    let err = client(&spawner)
        .invoke::<Value, _, _>("history", ["0", "50", "all"])
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InternalError);
    assert!(err.message.contains("exited with code 3"));
}

#[tokio::test]
async fn spawn_failure_is_not_found() {
    let spawner = ScriptedSpawner::failing();

    let err = client(&spawner)
        .invoke::<Value, _, _>("keyring-status", Vec::<String>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(err.message.contains(BACKEND));
}

#[tokio::test]
async fn deadline_terminates_process_with_timeout_reason() {
    let spawner = ScriptedSpawner::new(Script::output(&["{"]).exit(Exit::UntilTerminated));

    let err = invoker(&spawner, Duration::from_millis(50))
        .invoke::<Value>(&ListOrphans.command())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.message, "Backend operation timed out after 0.05s");
    let terminator = spawner.last_terminator().unwrap();
    assert_eq!(terminator.reason().as_deref(), Some(REASON_TIMEOUT));
}

#[tokio::test]
async fn late_success_does_not_change_settled_timeout() {
    let spawner = ScriptedSpawner::new(
        Script::output(&[r#"{"orphans":[],"total_size":0}"#])
            .chunk_delay(Duration::from_millis(300)),
    );
    let invoker = invoker(&spawner, Duration::from_millis(30));

    let result = invoker.invoke::<Value>(&ListOrphans.command()).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(
        spawner.last_terminator().unwrap().reason().as_deref(),
        Some(REASON_TIMEOUT)
    );
}

#[tokio::test]
async fn typed_query_deserializes_response() {
    let spawner = ScriptedSpawner::new(Script::output(&[
        r#"{"requires_reboot":true,"reason":"kernel_update","running_kernel":"6.8.1","installed_kernel":"6.8.2"}"#,
    ]));

    let status = client(&spawner).query(&GetRebootStatus).await.unwrap();

    assert!(status.requires_reboot);
    assert_eq!(status.reason, "kernel_update");
    assert_eq!(status.installed_kernel.as_deref(), Some("6.8.2"));
    assert!(status.updated_packages.is_empty());
    assert_eq!(spawner.requests()[0].argv, [BACKEND, "reboot-status"]);
}

#[tokio::test]
async fn typed_query_rejects_wrong_shape() {
    let spawner = ScriptedSpawner::new(Script::output(&[r#"{"orphans":"none"}"#]));

    let err = client(&spawner).query(&ListOrphans).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::InternalError);
    assert!(err.message.contains("unexpected response shape for list-orphans"));
}

#[tokio::test]
async fn privileged_query_requests_escalation() {
    let spawner = ScriptedSpawner::new(Script::output(&[
        r#"{"success":true,"package":"linux","message":"Added linux to IgnorePkg"}"#,
    ]));

    let response = client(&spawner)
        .query(&AddIgnored {
            package: "linux".to_string(),
        })
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(spawner.requests()[0].privilege, Privilege::Required);
    assert_eq!(spawner.requests()[0].argv, [BACKEND, "add-ignored", "linux"]);
}
