//! High-level client over the backend executable.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::ClientConfig;

use super::error::ClientError;
use super::invoker::Invoker;
use super::ops::{QueryOperation, StreamOperation};
use super::process::{BackendCommand, Privilege, ProcessSpawner, Spawner};
use super::stream::{self, StreamCallbacks, StreamHandle};

/// Entry point for running backend commands.
///
/// Cheap to clone; each call spawns its own process and owns its own state.
#[derive(Clone)]
pub struct BackendClient {
    spawner: Arc<dyn Spawner>,
    invoker: Invoker,
    backend_path: String,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("backend_path", &self.backend_path)
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a client that spawns real processes according to `config`.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let spawner = ProcessSpawner::new()
            .escalation(config.escalation.clone())
            .escalate_optional(config.escalate_queries)
            .terminate_grace(config.terminate_grace());
        Self::with_spawner(config, Arc::new(spawner))
    }

    /// Create a client with a custom spawner.
    #[must_use]
    pub fn with_spawner(config: &ClientConfig, spawner: Arc<dyn Spawner>) -> Self {
        let invoker = Invoker::new(Arc::clone(&spawner), config.backend_path.clone())
            .with_timeout(config.timeout());
        Self {
            spawner,
            invoker,
            backend_path: config.backend_path.clone(),
        }
    }

    /// Path of the backend executable.
    #[must_use]
    pub fn backend_path(&self) -> &str {
        &self.backend_path
    }

    /// Run a one-shot command by name, parsing its output as `T`.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub async fn invoke<T, I, S>(&self, name: &str, args: I) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = BackendCommand::new(name, Privilege::Optional).args(args);
        self.invoker.invoke(&command).await
    }

    /// Run a one-shot command.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub async fn invoke_command<T: DeserializeOwned>(
        &self,
        command: &BackendCommand,
    ) -> Result<T, ClientError> {
        self.invoker.invoke(command).await
    }

    /// Run a typed query operation.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub async fn query<Q: QueryOperation>(&self, op: &Q) -> Result<Q::Response, ClientError> {
        self.invoker.invoke(&op.command()).await
    }

    /// Start a streaming command by name.
    pub fn start_stream<I, S>(&self, name: &str, args: I, callbacks: StreamCallbacks) -> StreamHandle
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = BackendCommand::new(name, Privilege::Required).args(args);
        self.start_command(&command, callbacks)
    }

    /// Start a streaming session for an explicit command.
    pub fn start_command(&self, command: &BackendCommand, callbacks: StreamCallbacks) -> StreamHandle {
        stream::start(&self.spawner, &self.backend_path, command, callbacks)
    }

    /// Start a typed streaming operation.
    pub fn stream<O: StreamOperation>(&self, op: &O, callbacks: StreamCallbacks) -> StreamHandle {
        self.start_command(&op.command(), callbacks)
    }
}
