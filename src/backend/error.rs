//! Error taxonomy for backend failures.
//!
//! The backend either reports a structured error envelope
//! (`{"code": ..., "message": ..., "details": ...}`) or fails with free-form
//! text. [`classify`] maps the latter onto the same [`ErrorKind`] set so
//! callers can branch on semantics in both cases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of failure kinds callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    DatabaseLocked,
    NetworkError,
    TransactionFailed,
    ValidationError,
    Cancelled,
    NotFound,
    PermissionDenied,
    InternalError,
}

impl ErrorKind {
    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::DatabaseLocked => "database_locked",
            Self::NetworkError => "network_error",
            Self::TransactionFailed => "transaction_failed",
            Self::ValidationError => "validation_error",
            Self::Cancelled => "cancelled",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::InternalError => "internal_error",
        }
    }

    /// Parse a wire name. Unknown codes yield `None`.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "timeout" => Self::Timeout,
            "database_locked" => Self::DatabaseLocked,
            "network_error" => Self::NetworkError,
            "transaction_failed" => Self::TransactionFailed,
            "validation_error" => Self::ValidationError,
            "cancelled" => Self::Cancelled,
            "not_found" => Self::NotFound,
            "permission_denied" => Self::PermissionDenied,
            "internal_error" => Self::InternalError,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether retrying the same command later may succeed.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::DatabaseLocked | Self::NetworkError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring rules in priority order. First match wins.
const RULES: &[(&[&str], ErrorKind)] = &[
    (&["timed out", "timeout"], ErrorKind::Timeout),
    (
        &["unable to lock database", "database is locked"],
        ErrorKind::DatabaseLocked,
    ),
    (
        &["connection", "network", "resolve host"],
        ErrorKind::NetworkError,
    ),
    (&["transaction", "commit"], ErrorKind::TransactionFailed),
    (&["cancelled", "canceled"], ErrorKind::Cancelled),
    (&["not found"], ErrorKind::NotFound),
    (&["permission denied"], ErrorKind::PermissionDenied),
    (&["invalid", "validation"], ErrorKind::ValidationError),
];

/// Classify free-form failure text into an [`ErrorKind`].
///
/// Case-insensitive substring match. Only used when the backend did not
/// supply a structured error envelope.
#[must_use]
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map_or(ErrorKind::InternalError, |(_, kind)| *kind)
}

/// The single error type returned by one-shot backend commands.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ClientError {
    /// Semantic kind.
    #[serde(rename = "code")]
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Optional extra detail from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ClientError {
    /// Create an error without details.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Shorthand for an `internal_error`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Interpret a parsed response as a structured error envelope.
    ///
    /// Any top-level object carrying both `code` and `message` is an error.
    /// The backend's code is authoritative; codes outside the known set
    /// become `internal_error` rather than being re-classified from text.
    #[must_use]
    pub fn from_envelope(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let code = obj.get("code")?;
        let message = obj.get("message")?;

        let kind = code
            .as_str()
            .and_then(ErrorKind::from_code)
            .unwrap_or(ErrorKind::InternalError);
        let details = match obj.get("details") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Some(Self {
            kind,
            message: text_of(message),
            details,
        })
    }
}

fn text_of(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
