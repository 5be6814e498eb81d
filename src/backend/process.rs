//! Backend process spawning and control.
//!
//! The [`Spawner`] trait is the seam between the client and the operating
//! system: it takes an argv plus a privilege level and hands back a live
//! output channel, an exit future and a [`Terminator`]. [`ProcessSpawner`]
//! is the `tokio::process` implementation.

use std::borrow::Cow;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Termination reason used when a one-shot command exceeds its deadline.
pub const REASON_TIMEOUT: &str = "timeout";

/// Termination reason used when a caller cancels a streaming session.
pub const REASON_CANCELLED: &str = "cancelled";

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Capacity of the output chunk channel.
pub const CHUNK_CHANNEL_BUFFER: usize = 64;

const READ_BUFFER_SIZE: usize = 8192;

/// Privilege level requested for a backend invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Escalate only if configured to; otherwise run as the current user.
    Optional,
    /// Always escalate (unless already root).
    Required,
}

/// What happens to the child's stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stderr separately and surface it as the failure message.
    CaptureStderr,
    /// Interleave stderr with stdout on the output channel.
    MergeStderr,
}

/// One backend invocation: subcommand name, positional args and privilege.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCommand {
    name: String,
    args: Vec<String>,
    privilege: Privilege,
}

impl BackendCommand {
    /// Create a command with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, privilege: Privilege) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            privilege,
        }
    }

    /// Append one positional argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several positional arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Subcommand name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Requested privilege.
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }
}

/// A fully resolved spawn request handed to a [`Spawner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Requested privilege.
    pub privilege: Privilege,
    /// Stderr handling.
    pub mode: OutputMode,
}

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Backend binary not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied executing {0}")]
    PermissionDenied(String),
    /// Nothing to execute.
    #[error("Empty command line")]
    EmptyCommand,
    /// A requested pipe was not available after spawning.
    #[error("Process {0} not available")]
    MissingPipe(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Why a backend process did not finish successfully.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessFailure {
    /// Failure text (captured stderr, spawn error, termination notice).
    pub message: Option<String>,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Termination reason, when the client asked the process to stop.
    pub problem: Option<String>,
}

impl ProcessFailure {
    /// Failure carrying only a message.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Failure caused by a termination request.
    #[must_use]
    pub fn terminated(reason: &str) -> Self {
        Self {
            message: Some(format!("Backend process terminated ({reason})")),
            exit_code: None,
            problem: Some(reason.to_string()),
        }
    }

    /// Failure from a non-zero exit status with whatever stderr was captured.
    #[must_use]
    pub fn from_status(status: ExitStatus, stderr: &str) -> Self {
        let stderr = stderr.trim();
        Self {
            message: (!stderr.is_empty()).then(|| stderr.to_string()),
            exit_code: status.code(),
            problem: None,
        }
    }

    /// Message text, falling back to a description of the exit status.
    #[must_use]
    pub fn describe(&self) -> String {
        match (&self.message, self.exit_code) {
            (Some(message), _) => message.clone(),
            (None, Some(code)) => format!("exited with code {code}"),
            (None, None) => "exited with unknown status".to_string(),
        }
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for ProcessFailure {}

impl From<SpawnError> for ProcessFailure {
    fn from(err: SpawnError) -> Self {
        Self::from_message(err.to_string())
    }
}

/// Handle for requesting termination of a running process.
///
/// Clones share state. Only the first reason is kept.
#[derive(Debug, Clone, Default)]
pub struct Terminator {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

impl Terminator {
    /// Create a terminator that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the process to stop. Advisory and idempotent.
    pub fn terminate(&self, reason: &str) {
        if let Ok(mut slot) = self.reason.lock() {
            slot.get_or_insert_with(|| reason.to_string());
        }
        self.token.cancel();
    }

    /// Whether termination has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The first termination reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().ok().and_then(|slot| slot.clone())
    }

    /// Resolve once termination is requested, yielding the reason.
    pub async fn requested(&self) -> String {
        self.token.cancelled().await;
        self.reason().unwrap_or_else(|| "terminated".to_string())
    }
}

/// A spawned backend process.
pub struct SpawnedProcess {
    /// Raw output chunks in arrival order. Closed when output ends.
    pub output: mpsc::Receiver<Vec<u8>>,
    /// Resolves when the process has exited.
    pub exit: BoxFuture<'static, Result<(), ProcessFailure>>,
    /// Requests termination.
    pub terminator: Terminator,
}

impl fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("terminator", &self.terminator)
            .finish_non_exhaustive()
    }
}

/// Capability to start backend processes.
pub trait Spawner: Send + Sync {
    /// Start a process. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process cannot be started.
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, SpawnError>;
}

/// [`Spawner`] backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    escalation: Vec<String>,
    escalate_optional: bool,
    terminate_grace: Duration,
}

impl Default for ProcessSpawner {
    fn default() -> Self {
        Self {
            escalation: vec!["pkexec".to_string()],
            escalate_optional: false,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
        }
    }
}

impl ProcessSpawner {
    /// Create a spawner with `pkexec` escalation for required privilege.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the escalation wrapper (e.g. `["sudo", "-n"]`). Empty disables it.
    #[must_use]
    pub fn escalation(mut self, wrapper: Vec<String>) -> Self {
        self.escalation = wrapper;
        self
    }

    /// Also escalate commands that only request optional privilege.
    #[must_use]
    pub fn escalate_optional(mut self, yes: bool) -> Self {
        self.escalate_optional = yes;
        self
    }

    /// Grace period between SIGTERM and SIGKILL.
    #[must_use]
    pub fn terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    /// The argv actually executed for a request, escalation included.
    #[must_use]
    pub fn effective_argv(&self, request: &SpawnRequest) -> Vec<String> {
        let wants = match request.privilege {
            Privilege::Required => true,
            Privilege::Optional => self.escalate_optional,
        };
        if wants && !self.escalation.is_empty() && !running_as_root() {
            self.escalation
                .iter()
                .chain(request.argv.iter())
                .cloned()
                .collect()
        } else {
            request.argv.clone()
        }
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, SpawnError> {
        let argv = self.effective_argv(request);
        let (program, rest) = argv.split_first().ok_or(SpawnError::EmptyCommand)?;

        tracing::debug!(
            command = %display_argv(&argv),
            privilege = ?request.privilege,
            mode = ?request.mode,
            "Spawning backend process"
        );

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(program, e))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingPipe("stderr"))?;

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_BUFFER);
        tokio::spawn(pump(stdout, tx.clone()));
        let captured = match request.mode {
            OutputMode::MergeStderr => {
                tokio::spawn(pump(stderr, tx));
                None
            }
            OutputMode::CaptureStderr => {
                drop(tx);
                Some(tokio::spawn(collect(stderr)))
            }
        };

        let terminator = Terminator::new();
        let task = tokio::spawn(supervise(
            child,
            terminator.clone(),
            captured,
            self.terminate_grace,
        ));
        let exit = async move {
            task.await
                .unwrap_or_else(|e| Err(ProcessFailure::from_message(e.to_string())))
        }
        .boxed();

        Ok(SpawnedProcess {
            output: rx,
            exit,
            terminator,
        })
    }
}

/// Forward raw reads to the chunk channel until EOF or the receiver is gone.
async fn pump<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Backend output read failed");
                break;
            }
        }
    }
}

async fn collect<R>(mut reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    if let Err(e) = reader.read_to_end(&mut bytes).await {
        tracing::debug!(error = %e, "Backend stderr read failed");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Wait for the child, honouring termination requests.
async fn supervise(
    mut child: Child,
    terminator: Terminator,
    captured: Option<JoinHandle<String>>,
    grace: Duration,
) -> Result<(), ProcessFailure> {
    let status = tokio::select! {
        status = child.wait() => status,
        reason = terminator.requested() => {
            tracing::debug!(reason = %reason, "Terminating backend process");
            if let Err(e) = graceful_terminate(&mut child, grace).await {
                tracing::warn!(error = %e, "Failed to terminate backend process");
            }
            return Err(ProcessFailure::terminated(&reason));
        }
    };

    let status = status.map_err(|e| ProcessFailure::from_message(e.to_string()))?;
    tracing::debug!(code = ?status.code(), "Backend process exited");
    if status.success() {
        return Ok(());
    }

    let stderr = match captured {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    Err(ProcessFailure::from_status(status, &stderr))
}

/// Attempt graceful termination with a timeout.
///
/// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
/// On other platforms, falls back to immediate kill.
async fn graceful_terminate(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            // Already reaped.
            return Ok(());
        };
        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
            tracing::warn!(pid, error = %e, "Failed to send SIGTERM to backend process");
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => child.kill().await,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await
    }
}

fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(not(unix))]
    {
        false
    }
}

/// Render an argv as a shell-quoted string for logs.
#[must_use]
pub fn display_argv(argv: &[String]) -> String {
    argv.iter()
        .map(|a| shell_escape::escape(Cow::from(a.as_str())).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
