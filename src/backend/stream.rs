//! Streaming backend operations.
//!
//! Long-running operations emit newline-delimited [`StreamEvent`] records
//! and finish with one `complete` record. A [`StreamSession`] reassembles
//! lines from arbitrary output chunks, dispatches typed events to the
//! caller's [`StreamCallbacks`], and guarantees that `on_complete` or
//! `on_error` fires at most once however the backend behaves.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::events::StreamEvent;
use super::invoker::build_argv;
use super::process::{
    BackendCommand, OutputMode, ProcessFailure, SpawnRequest, SpawnedProcess, Spawner,
    Terminator, REASON_CANCELLED,
};

/// Message reported when the process exits cleanly without a `complete`
/// record.
pub const MISSING_COMPLETION_MESSAGE: &str =
    "Backend process ended without sending completion status";

/// Message reported for a failed `complete` record without a message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Operation failed";

/// How long output may stay idle after the process exits before the
/// session stops reading it.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

type EventCallback = Box<dyn FnMut(&StreamEvent) + Send>;
type DataCallback = Box<dyn FnMut(&str) + Send>;
type CompleteCallback = Box<dyn FnMut() + Send>;
type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Optional callbacks receiving a session's output.
#[derive(Default)]
pub struct StreamCallbacks {
    on_event: Option<EventCallback>,
    on_data: Option<DataCallback>,
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
}

impl fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_event", &self.on_event.is_some())
            .field("on_data", &self.on_data.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl StreamCallbacks {
    /// Create an empty callback set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every parsed event.
    #[must_use]
    pub fn on_event(mut self, f: impl FnMut(&StreamEvent) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    /// Receive human-readable text: mirrored events and unparseable lines.
    #[must_use]
    pub fn on_data(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_data = Some(Box::new(f));
        self
    }

    /// Called once when the operation succeeds.
    #[must_use]
    pub fn on_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called once when the operation fails.
    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

/// Terminal result of a streaming session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The backend reported success.
    Completed,
    /// The operation failed with this message.
    Failed(String),
}

impl StreamOutcome {
    /// Returns true for [`StreamOutcome::Completed`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Splits a byte stream into `\n`-terminated lines.
///
/// Bytes after the last newline stay buffered until more data arrives, so
/// records (and multi-byte characters) split across reads are rejoined.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Take whatever is left without a trailing newline.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Per-session state: line buffer, callbacks and the terminal latch.
///
/// Synchronous; the async driver feeds it chunks and the exit result.
pub struct StreamSession {
    buffer: LineBuffer,
    callbacks: StreamCallbacks,
    outcome: Option<StreamOutcome>,
    command: String,
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("command", &self.command)
            .field("buffered", &self.buffer.pending_len())
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Create a session for the named command.
    #[must_use]
    pub fn new(command: impl Into<String>, callbacks: StreamCallbacks) -> Self {
        Self {
            buffer: LineBuffer::new(),
            callbacks,
            outcome: None,
            command: command.into(),
        }
    }

    /// The terminal outcome, once one has been delivered.
    #[must_use]
    pub fn outcome(&self) -> Option<&StreamOutcome> {
        self.outcome.as_ref()
    }

    /// Whether a terminal callback has already fired.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// Feed one output chunk.
    pub fn feed(&mut self, chunk: &[u8]) {
        for line in self.buffer.push(chunk) {
            self.process_line(&line);
        }
    }

    /// Handle one complete line.
    ///
    /// Lines that are not events, blank ones included, reach `on_data`
    /// byte for byte with the newline restored.
    pub fn process_line(&mut self, line: &str) {
        let record = line.strip_suffix('\r').unwrap_or(line);
        let event = match serde_json::from_str::<StreamEvent>(record) {
            Ok(event) => event,
            Err(e) => {
                tracing::trace!(command = %self.command, error = %e, "Forwarding raw backend line");
                self.emit_data(&format!("{line}\n"));
                return;
            }
        };

        if let Some(cb) = self.callbacks.on_event.as_mut() {
            cb(&event);
        }

        if let StreamEvent::Complete { success, message } = event {
            self.mark_terminal(success, message.as_deref());
        } else if let Some(text) = event.mirror_line() {
            self.emit_data(&text);
        }
    }

    /// Deliver the terminal outcome unless one was already delivered.
    pub fn mark_terminal(&mut self, success: bool, message: Option<&str>) {
        if self.outcome.is_some() {
            tracing::debug!(command = %self.command, "Ignoring repeated terminal outcome");
            return;
        }

        if success {
            self.outcome = Some(StreamOutcome::Completed);
            if let Some(cb) = self.callbacks.on_complete.as_mut() {
                cb();
            }
        } else {
            let message = message.unwrap_or(DEFAULT_FAILURE_MESSAGE);
            self.outcome = Some(StreamOutcome::Failed(message.to_string()));
            if let Some(cb) = self.callbacks.on_error.as_mut() {
                cb(message);
            }
        }
    }

    /// The process exited successfully: flush the buffer and require a
    /// terminal record.
    pub fn finish_clean(&mut self) {
        if let Some(rest) = self.buffer.take_remainder() {
            self.process_line(&rest);
        }
        if self.outcome.is_none() {
            tracing::warn!(command = %self.command, "Backend exited without completion record");
            self.mark_terminal(false, Some(MISSING_COMPLETION_MESSAGE));
        }
    }

    /// The process failed, was terminated or could not be started.
    pub fn finish_failed(&mut self, failure: &ProcessFailure) {
        let message = failure.message.clone().unwrap_or_else(|| {
            let code = failure
                .exit_code
                .map_or_else(|| "unknown".to_string(), |c| c.to_string());
            format!("Operation failed (exit {code})")
        });
        if let Some(reason) = &failure.problem {
            tracing::info!(
                command = %self.command,
                reason = %reason,
                "Streaming session stopped on request"
            );
        }
        self.mark_terminal(false, Some(&message));
    }

    /// Drive a spawned process to completion.
    pub async fn run(mut self, process: SpawnedProcess) -> StreamOutcome {
        let SpawnedProcess {
            mut output,
            mut exit,
            ..
        } = process;

        // A descendant that inherited the pipe can hold it open after the
        // backend itself is gone, so exit is not gated on EOF.
        let status = loop {
            tokio::select! {
                biased;
                chunk = output.recv() => match chunk {
                    Some(chunk) => self.feed(&chunk),
                    None => break (&mut exit).await,
                },
                status = &mut exit => break status,
            }
        };

        while let Ok(Some(chunk)) = tokio::time::timeout(OUTPUT_DRAIN_GRACE, output.recv()).await {
            self.feed(&chunk);
        }

        match status {
            Ok(()) => self.finish_clean(),
            Err(failure) => {
                tracing::debug!(command = %self.command, failure = %failure, "Backend process failed");
                self.finish_failed(&failure);
            }
        }

        self.into_outcome()
    }

    fn into_outcome(self) -> StreamOutcome {
        self.outcome
            .unwrap_or_else(|| StreamOutcome::Failed(MISSING_COMPLETION_MESSAGE.to_string()))
    }

    fn emit_data(&mut self, text: &str) {
        if let Some(cb) = self.callbacks.on_data.as_mut() {
            cb(text);
        }
    }
}

/// Handle to a running streaming session.
#[derive(Debug)]
pub struct StreamHandle {
    terminator: Terminator,
    task: JoinHandle<StreamOutcome>,
}

impl StreamHandle {
    /// Ask the backend to stop. Does not invoke any callback itself; the
    /// resulting process exit reports the outcome.
    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    /// A cloneable cancel handle usable after [`StreamHandle::finished`]
    /// has taken ownership of the session.
    #[must_use]
    pub fn canceller(&self) -> StreamCanceller {
        StreamCanceller {
            terminator: self.terminator.clone(),
        }
    }

    /// Whether the session has delivered its outcome.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to deliver its terminal outcome.
    pub async fn finished(self) -> StreamOutcome {
        self.task
            .await
            .unwrap_or_else(|e| StreamOutcome::Failed(format!("Streaming session aborted: {e}")))
    }
}

/// Cancels a streaming session from another task.
#[derive(Debug, Clone)]
pub struct StreamCanceller {
    terminator: Terminator,
}

impl StreamCanceller {
    /// Same as [`StreamHandle::cancel`].
    pub fn cancel(&self) {
        tracing::debug!("Cancelling streaming session");
        self.terminator.terminate(REASON_CANCELLED);
    }
}

/// Start a streaming session for `command`.
///
/// Must be called from within a tokio runtime.
pub fn start(
    spawner: &Arc<dyn Spawner>,
    backend_path: &str,
    command: &BackendCommand,
    callbacks: StreamCallbacks,
) -> StreamHandle {
    let request = SpawnRequest {
        argv: build_argv(backend_path, command),
        privilege: command.privilege(),
        mode: OutputMode::MergeStderr,
    };
    let mut session = StreamSession::new(command.name(), callbacks);

    match spawner.spawn(&request) {
        Ok(process) => {
            let terminator = process.terminator.clone();
            let task = tokio::spawn(session.run(process));
            StreamHandle { terminator, task }
        }
        Err(e) => {
            tracing::warn!(command = %command.name(), error = %e, "Failed to spawn backend");
            let failure = ProcessFailure::from(e);
            let task = tokio::spawn(async move {
                session.finish_failed(&failure);
                session.into_outcome()
            });
            StreamHandle {
                terminator: Terminator::new(),
                task,
            }
        }
    }
}
