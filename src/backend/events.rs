//! Event records emitted by the backend on streaming operations.
//!
//! Each line of a streaming operation's stdout is one JSON object tagged by
//! its `type` field. Exactly one `complete` record ends the stream.

use serde::{Deserialize, Serialize};

/// Download phase reported when a transfer has progressed.
pub const DOWNLOAD_PROGRESS: &str = "progress";

/// Download phase reported when a transfer has finished.
pub const DOWNLOAD_COMPLETED: &str = "completed";

/// Events emitted by the backend in NDJSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Log line forwarded from libalpm.
    Log {
        /// Log level (`error`, `warning`, `debug`, ...).
        level: String,
        /// Log text.
        message: String,
    },
    /// Per-package progress of a transaction step.
    Progress {
        /// Step name (e.g. `upgrade_start`).
        operation: String,
        /// Package being processed.
        package: String,
        /// Index of this package within the step.
        current: usize,
        /// Number of packages in the step.
        total: usize,
        /// Percent complete for this package.
        percent: i32,
    },
    /// File transfer progress.
    Download {
        /// File being downloaded.
        filename: String,
        /// Phase: `init`, `progress`, `retry` or `completed`.
        event: String,
        /// Bytes received so far.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        downloaded: Option<i64>,
        /// Expected size in bytes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<i64>,
    },
    /// Named transaction milestone, optionally tied to a package.
    Event {
        /// Milestone name.
        event: String,
        /// Package involved, if any.
        #[serde(default)]
        package: Option<String>,
    },
    /// Terminal record.
    Complete {
        /// Whether the operation succeeded.
        success: bool,
        /// Failure (or informational) message.
        #[serde(default)]
        message: Option<String>,
    },
}

impl StreamEvent {
    /// Returns true if this is the terminal record.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Human-readable line mirroring this event, including the trailing
    /// newline. `None` for records that have no textual form.
    #[must_use]
    pub fn mirror_line(&self) -> Option<String> {
        match self {
            Self::Log { level, message } => Some(format!("[{level}] {message}\n")),
            Self::Progress {
                operation,
                package,
                percent,
                ..
            } => Some(format!("[{operation}] {package} {percent}%\n")),
            Self::Download {
                filename,
                event,
                downloaded,
                total,
            } => match event.as_str() {
                DOWNLOAD_PROGRESS => {
                    let pct = download_percent((*downloaded)?, (*total)?)?;
                    Some(format!("Downloading {filename}: {pct}%\n"))
                }
                DOWNLOAD_COMPLETED => Some(format!("Downloaded {filename}\n")),
                _ => None,
            },
            Self::Event { event, package } => Some(match package {
                Some(pkg) => format!("{event}: {pkg}\n"),
                None => format!("{event}\n"),
            }),
            Self::Complete { .. } => None,
        }
    }
}

/// Rounded percentage of `downloaded` over `total`. `None` when the total
/// is unknown (zero or negative).
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn download_percent(downloaded: i64, total: i64) -> Option<i64> {
    if total <= 0 {
        return None;
    }
    Some((downloaded as f64 / total as f64 * 100.0).round() as i64)
}
