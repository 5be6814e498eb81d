//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default install location of the backend executable.
pub const DEFAULT_BACKEND_PATH: &str = "/usr/libexec/cockpit-pacman/cockpit-pacman-backend";

fn default_backend_path() -> String {
    DEFAULT_BACKEND_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_terminate_grace_secs() -> u64 {
    5
}

fn default_escalation() -> Vec<String> {
    vec!["pkexec".to_string()]
}

/// Configuration for the backend client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path of the backend executable.
    #[serde(default = "default_backend_path")]
    pub backend_path: String,
    /// Deadline for one-shot commands, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds between SIGTERM and SIGKILL when stopping the backend.
    #[serde(default = "default_terminate_grace_secs")]
    pub terminate_grace_secs: u64,
    /// Command prefixed to privileged invocations. Empty disables escalation.
    #[serde(default = "default_escalation")]
    pub escalation: Vec<String>,
    /// Escalate read-only queries as well.
    #[serde(default)]
    pub escalate_queries: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_path: default_backend_path(),
            timeout_secs: default_timeout_secs(),
            terminate_grace_secs: default_terminate_grace_secs(),
            escalation: default_escalation(),
            escalate_queries: false,
        }
    }
}

impl ClientConfig {
    /// One-shot deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// SIGTERM grace period.
    #[must_use]
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_secs(self.terminate_grace_secs)
    }
}
