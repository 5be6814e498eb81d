//! One-shot backend commands.
//!
//! A query spawns the backend once, collects its whole stdout and parses a
//! single JSON document from it, all under a deadline. Whichever of the
//! process or the deadline finishes first decides the result; the other
//! side is dropped, which also cancels the pending timer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use super::error::{classify, ClientError, ErrorKind};
use super::process::{
    BackendCommand, OutputMode, ProcessFailure, SpawnRequest, SpawnedProcess, Spawner,
    REASON_TIMEOUT,
};

/// Default deadline for one-shot commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one-shot backend commands.
#[derive(Clone)]
pub struct Invoker {
    spawner: Arc<dyn Spawner>,
    backend_path: String,
    timeout: Duration,
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("backend_path", &self.backend_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// What came back from a finished process.
struct Completion {
    stdout: String,
    status: Result<(), ProcessFailure>,
}

impl Invoker {
    /// Create an invoker for the backend at `backend_path`.
    #[must_use]
    pub fn new(spawner: Arc<dyn Spawner>, backend_path: impl Into<String>) -> Self {
        Self {
            spawner,
            backend_path: backend_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the deadline for each command.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` and deserialize its JSON output as `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the process fails, the deadline
    /// passes, the output is empty or not JSON, or the backend reports a
    /// structured error.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        command: &BackendCommand,
    ) -> Result<T, ClientError> {
        let name = command.name();
        let started = Instant::now();
        let request = SpawnRequest {
            argv: build_argv(&self.backend_path, command),
            privilege: command.privilege(),
            mode: OutputMode::CaptureStderr,
        };

        let SpawnedProcess {
            output,
            exit,
            terminator,
        } = match self.spawner.spawn(&request) {
            Ok(process) => process,
            Err(e) => return Err(failure_error(name, &e.into())),
        };

        let completion = tokio::select! {
            completion = collect(output, exit) => completion,
            () = tokio::time::sleep(self.timeout) => {
                terminator.terminate(REASON_TIMEOUT);
                tracing::warn!(
                    command = %name,
                    timeout = ?self.timeout,
                    "Backend command timed out"
                );
                return Err(ClientError::new(
                    ErrorKind::Timeout,
                    format!(
                        "Backend operation timed out after {}s",
                        self.timeout.as_secs_f64()
                    ),
                ));
            }
        };

        tracing::debug!(
            command = %name,
            elapsed = ?started.elapsed(),
            ok = completion.status.is_ok(),
            "Backend command finished"
        );

        match completion.status {
            Ok(()) => parse_response(name, &completion.stdout),
            Err(failure) => Err(envelope_in(&completion.stdout)
                .or_else(|| failure.message.as_deref().and_then(envelope_in))
                .unwrap_or_else(|| failure_error(name, &failure))),
        }
    }
}

/// `[backend, name, args...]`.
#[must_use]
pub fn build_argv(backend_path: &str, command: &BackendCommand) -> Vec<String> {
    std::iter::once(backend_path.to_string())
        .chain(std::iter::once(command.name().to_string()))
        .chain(command.arguments().iter().cloned())
        .collect()
}

async fn collect(
    mut output: mpsc::Receiver<Vec<u8>>,
    exit: BoxFuture<'static, Result<(), ProcessFailure>>,
) -> Completion {
    let mut bytes = Vec::new();
    while let Some(chunk) = output.recv().await {
        bytes.extend_from_slice(&chunk);
    }
    let status = exit.await;
    Completion {
        stdout: String::from_utf8_lossy(&bytes).into_owned(),
        status,
    }
}

/// Interpret the stdout of a successful one-shot command.
///
/// # Errors
///
/// Returns `internal_error` for empty, non-JSON or mistyped output, and
/// the backend's own error for a structured error envelope.
pub fn parse_response<T: DeserializeOwned>(name: &str, text: &str) -> Result<T, ClientError> {
    if text.trim().is_empty() {
        return Err(ClientError::internal(format!(
            "Backend returned empty response for command: {name}"
        )));
    }

    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        ClientError::internal(format!("Backend returned invalid JSON for {name}: {e}"))
    })?;

    if let Some(err) = ClientError::from_envelope(&value) {
        return Err(err);
    }

    serde_json::from_value(value).map_err(|e| {
        ClientError::internal(format!(
            "Backend returned unexpected response shape for {name}: {e}"
        ))
    })
}

/// A structured error envelope printed alongside a failing exit, if any.
fn envelope_in(text: &str) -> Option<ClientError> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    ClientError::from_envelope(&value)
}

fn failure_error(name: &str, failure: &ProcessFailure) -> ClientError {
    let text = failure.describe();
    ClientError::new(
        classify(&text),
        format!("Backend command '{name}' failed: {text}"),
    )
}
