//! Tests for streaming sessions driven through the client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pacman_client::backend::{
    BackendClient, OutputMode, Privilege, ProcessFailure, RemoveOrphans, StreamCallbacks,
    StreamEvent, StreamOutcome, SyncDatabase, Upgrade, MISSING_COMPLETION_MESSAGE,
    REASON_CANCELLED,
};
use pacman_client::config::ClientConfig;

use super::fake::{Exit, Script, ScriptedSpawner};

const BACKEND: &str = "/usr/libexec/test-backend";

const PROGRESS: &str = r#"{"type":"progress","operation":"upgrade_start","package":"linux","current":1,"total":5,"percent":20}"#;
const COMPLETE_OK: &str = r#"{"type":"complete","success":true}"#;

#[derive(Default, Clone)]
struct Recorder {
    events: Arc<Mutex<Vec<StreamEvent>>>,
    data: Arc<Mutex<Vec<String>>>,
    completes: Arc<Mutex<usize>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn callbacks(&self) -> StreamCallbacks {
        let events = Arc::clone(&self.events);
        let data = Arc::clone(&self.data);
        let completes = Arc::clone(&self.completes);
        let errors = Arc::clone(&self.errors);
        StreamCallbacks::new()
            .on_event(move |e| events.lock().unwrap().push(e.clone()))
            .on_data(move |d| data.lock().unwrap().push(d.to_string()))
            .on_complete(move || *completes.lock().unwrap() += 1)
            .on_error(move |m| errors.lock().unwrap().push(m.to_string()))
    }

    fn completes(&self) -> usize {
        *self.completes.lock().unwrap()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    fn terminal_count(&self) -> usize {
        self.completes() + self.errors().len()
    }
}

fn client(spawner: &ScriptedSpawner) -> BackendClient {
    let config = ClientConfig {
        backend_path: BACKEND.to_string(),
        ..ClientConfig::default()
    };
    BackendClient::with_spawner(&config, Arc::new(spawner.clone()))
}

#[tokio::test]
async fn upgrade_session_dispatches_in_order_and_completes_once() {
    let (head, tail) = PROGRESS.split_at(10);
    let tail = format!("{tail}\n");
    let log = "{\"type\":\"log\",\"level\":\"warning\",\"message\":\"disk low\"}\n";
    let complete = format!("{COMPLETE_OK}\n");
    let spawner = ScriptedSpawner::new(Script::output(&[
        head,
        tail.as_str(),
        log,
        "warning: something odd\n",
        complete.as_str(),
    ]));
    let rec = Recorder::default();

    let op = Upgrade {
        ignore: vec!["linux-lts".to_string()],
        timeout_secs: Some(900),
    };
    let outcome = client(&spawner).stream(&op, rec.callbacks()).finished().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(rec.completes(), 1);
    assert!(rec.errors().is_empty());

    let events = rec.events.lock().unwrap().clone();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], StreamEvent::Progress { percent: 20, .. }));
    assert!(matches!(&events[1], StreamEvent::Log { level, .. } if level == "warning"));
    assert!(events[2].is_terminal());

    assert_eq!(
        *rec.data.lock().unwrap(),
        [
            "[upgrade_start] linux 20%\n",
            "[warning] disk low\n",
            "warning: something odd\n",
        ]
    );

    let request = &spawner.requests()[0];
    assert_eq!(request.argv, [BACKEND, "upgrade", "linux-lts", "900"]);
    assert_eq!(request.privilege, Privilege::Required);
    assert_eq!(request.mode, OutputMode::MergeStderr);
}

#[tokio::test]
async fn failed_complete_reports_message_once() {
    let spawner = ScriptedSpawner::new(Script::output(&[
        "{\"type\":\"complete\",\"success\":false,\"message\":\"Package conflict\"}\n",
        "{\"type\":\"complete\",\"success\":true}\n",
    ]));
    let rec = Recorder::default();

    let outcome = client(&spawner)
        .stream(&RemoveOrphans::default(), rec.callbacks())
        .finished()
        .await;

    assert_eq!(outcome, StreamOutcome::Failed("Package conflict".to_string()));
    assert_eq!(rec.errors(), ["Package conflict"]);
    assert_eq!(rec.completes(), 0);
    assert_eq!(rec.events.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn complete_then_failed_exit_keeps_first_outcome() {
    let complete = format!("{COMPLETE_OK}\n");
    let spawner = ScriptedSpawner::new(Script::output(&[complete.as_str()]).exit(Exit::Failure(
        ProcessFailure {
            message: None,
            exit_code: Some(1),
            problem: None,
        },
    )));
    let rec = Recorder::default();

    let outcome = client(&spawner)
        .stream(&SyncDatabase::default(), rec.callbacks())
        .finished()
        .await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(rec.terminal_count(), 1);
}

#[tokio::test]
async fn unterminated_complete_is_flushed_at_exit() {
    let spawner = ScriptedSpawner::new(Script::output(&[COMPLETE_OK]));
    let rec = Recorder::default();

    let outcome = client(&spawner)
        .start_stream("refresh-keyring", Vec::<String>::new(), rec.callbacks())
        .finished()
        .await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(rec.completes(), 1);
}

#[tokio::test]
async fn clean_exit_without_complete_is_an_error() {
    let line = format!("{PROGRESS}\n");
    let spawner = ScriptedSpawner::new(Script::output(&[line.as_str()]));
    let rec = Recorder::default();

    let outcome = client(&spawner)
        .start_stream("init-keyring", Vec::<String>::new(), rec.callbacks())
        .finished()
        .await;

    assert_eq!(
        outcome,
        StreamOutcome::Failed(MISSING_COMPLETION_MESSAGE.to_string())
    );
    assert_eq!(rec.errors(), [MISSING_COMPLETION_MESSAGE]);
    assert_eq!(rec.completes(), 0);
}

#[tokio::test]
async fn spawn_failure_reports_through_on_error() {
    let spawner = ScriptedSpawner::failing();
    let rec = Recorder::default();

    let outcome = client(&spawner)
        .start_stream("clean-cache", ["3"], rec.callbacks())
        .finished()
        .await;

    assert!(!outcome.is_success());
    let errors = rec.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("not found"));
}

#[tokio::test]
async fn cancel_reports_only_through_process_exit() {
    let line = format!("{PROGRESS}\n");
    let spawner =
        ScriptedSpawner::new(Script::output(&[line.as_str()]).exit(Exit::UntilTerminated));
    let rec = Recorder::default();

    let handle = client(&spawner).start_stream("upgrade", [""], rec.callbacks());
    for _ in 0..100 {
        if !rec.events.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(rec.events.lock().unwrap().len(), 1);

    handle.cancel();
    assert_eq!(rec.terminal_count(), 0);
    assert!(!handle.is_finished());

    let outcome = handle.finished().await;

    let expected = format!("Backend process terminated ({REASON_CANCELLED})");
    assert_eq!(outcome, StreamOutcome::Failed(expected.clone()));
    assert_eq!(rec.errors(), [expected]);
    assert_eq!(rec.completes(), 0);
    assert_eq!(
        spawner.last_terminator().unwrap().reason().as_deref(),
        Some(REASON_CANCELLED)
    );
}

#[tokio::test]
async fn canceller_outlives_handle() {
    let spawner = ScriptedSpawner::new(Script::output(&[]).exit(Exit::UntilTerminated));
    let rec = Recorder::default();

    let handle = client(&spawner).start_stream("sync-database", ["false"], rec.callbacks());
    let canceller = handle.canceller();
    let waiter = tokio::spawn(handle.finished());

    canceller.cancel();
    canceller.cancel();
    let outcome = waiter.await.unwrap();

    assert!(!outcome.is_success());
    assert_eq!(rec.terminal_count(), 1);
}
