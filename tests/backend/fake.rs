//! Scripted `Spawner` used to drive the client without a real backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use pacman_client::backend::{
    ProcessFailure, SpawnError, SpawnRequest, SpawnedProcess, Spawner, Terminator,
};
use tokio::sync::{mpsc, oneshot};

/// How the scripted process ends once its output is written.
#[derive(Debug, Clone)]
pub enum Exit {
    Success,
    Failure(ProcessFailure),
    /// Keep running until a termination request arrives.
    UntilTerminated,
}

/// Output chunks plus exit behaviour for one spawned process.
#[derive(Debug, Clone)]
pub struct Script {
    chunks: Vec<Vec<u8>>,
    chunk_delay: Duration,
    exit: Exit,
}

impl Script {
    pub fn output(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            chunk_delay: Duration::ZERO,
            exit: Exit::Success,
        }
    }

    pub fn exit(mut self, exit: Exit) -> Self {
        self.exit = exit;
        self
    }

    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

#[derive(Clone, Default)]
pub struct ScriptedSpawner {
    script: Option<Script>,
    requests: Arc<Mutex<Vec<SpawnRequest>>>,
    terminators: Arc<Mutex<Vec<Terminator>>>,
}

impl ScriptedSpawner {
    pub fn new(script: Script) -> Self {
        Self {
            script: Some(script),
            ..Self::default()
        }
    }

    /// A spawner whose processes never start.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_terminator(&self) -> Option<Terminator> {
        self.terminators.lock().unwrap().last().cloned()
    }
}

impl Spawner for ScriptedSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, SpawnError> {
        self.requests.lock().unwrap().push(request.clone());
        let Some(script) = self.script.clone() else {
            return Err(SpawnError::NotFound(request.argv[0].clone()));
        };

        let terminator = Terminator::new();
        self.terminators.lock().unwrap().push(terminator.clone());

        let (tx, rx) = mpsc::channel(16);
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let writer = terminator.clone();
        let Script {
            chunks,
            chunk_delay,
            exit,
        } = script;
        let wait_for_terminate = matches!(exit, Exit::UntilTerminated);
        tokio::spawn(async move {
            for chunk in chunks {
                tokio::select! {
                    () = tokio::time::sleep(chunk_delay) => {}
                    _ = writer.requested() => break,
                }
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            if wait_for_terminate {
                writer.requested().await;
            }
            drop(tx);
            let _ = done_tx.send(());
        });

        let watcher = terminator.clone();
        let exit = async move {
            let _ = done_rx.await;
            if let Some(reason) = watcher.reason() {
                return Err(ProcessFailure::terminated(&reason));
            }
            match exit {
                Exit::Success => Ok(()),
                Exit::Failure(failure) => Err(failure),
                Exit::UntilTerminated => Err(ProcessFailure::terminated("terminated")),
            }
        }
        .boxed();

        Ok(SpawnedProcess {
            output: rx,
            exit,
            terminator,
        })
    }
}
