// SPDX-License-Identifier: MIT

//! The `RunnerFactory`/`Runner` collaborator (§6): spawns and drives the
//! Claude/Codex/Gemini subprocess. The runner binaries' actual wire
//! protocols are out of scope (§1 non-goals); this adapter speaks a
//! line-delimited JSON convention and leaves real parsing to whatever
//! concrete runner a deployment configures.

use async_trait::async_trait;
use cyrus_core::{RunnerEvent, RunnerSelection, RunnerSessionId};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn runner process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to write to runner stdin: {0}")]
    Write(#[source] std::io::Error),

    #[error("runner has no stdin handle open")]
    StdinClosed,

    #[error("runner process exited before reporting a session id")]
    NoSessionReported,
}

#[async_trait]
pub trait Runner: Send + Sync + 'static {
    /// Starts the process with the initial prompt, forwarding every
    /// decoded event to `on_event`, and returns the runner's own native
    /// session id once the first event reports it.
    async fn start(
        &self,
        prompt: String,
        on_event: mpsc::Sender<RunnerEvent>,
    ) -> Result<RunnerSessionId, RunnerError>;

    /// Appends a prompt to an already-running, streaming-capable runner.
    async fn add_stream_message(&self, text: String) -> Result<(), RunnerError>;

    async fn stop(&self) -> Result<(), RunnerError>;

    fn supports_streaming_input(&self) -> bool;

    async fn is_running(&self) -> bool;
}

#[async_trait]
pub trait RunnerFactory: Clone + Send + Sync + 'static {
    async fn create(&self, selection: &RunnerSelection) -> Arc<dyn Runner>;
}

/// Spawns the configured runner binary as a subprocess, writing prompts
/// to stdin and reading newline-delimited `RunnerEvent` JSON from stdout.
pub struct SubprocessRunner {
    binary: String,
    resume_session_id: Option<String>,
    child: AsyncMutex<Option<Child>>,
    running: Arc<AtomicBool>,
}

impl SubprocessRunner {
    pub fn new(binary: impl Into<String>, resume_session_id: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            resume_session_id,
            child: AsyncMutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Runner for SubprocessRunner {
    async fn start(
        &self,
        prompt: String,
        on_event: mpsc::Sender<RunnerEvent>,
    ) -> Result<RunnerSessionId, RunnerError> {
        let mut command = Command::new(&self.binary);
        if let Some(resume) = &self.resume_session_id {
            command.arg("--resume").arg(resume);
        }
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null());

        let mut child = command.spawn().map_err(RunnerError::Spawn)?;

        let mut stdin = child.stdin.take().ok_or(RunnerError::StdinClosed)?;
        stdin.write_all(prompt.as_bytes()).await.map_err(RunnerError::Write)?;
        stdin.write_all(b"\n").await.map_err(RunnerError::Write)?;

        let stdout = child.stdout.take().ok_or(RunnerError::NoSessionReported)?;
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let mut lines = BufReader::new(stdout).lines();
        let (session_tx, mut session_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let mut reported_session = false;
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(event) = serde_json::from_str::<RunnerEvent>(&line) else { continue };
                if !reported_session {
                    if let RunnerEvent::Session { runner_session_id } = &event {
                        reported_session = true;
                        let _ = session_tx.send(RunnerSessionId::new(runner_session_id.clone())).await;
                    }
                }
                if on_event.send(event).await.is_err() {
                    break;
                }
            }
            running.store(false, Ordering::SeqCst);
        });

        *self.child.lock().await = Some(child);
        session_rx.recv().await.ok_or(RunnerError::NoSessionReported)
    }

    async fn add_stream_message(&self, text: String) -> Result<(), RunnerError> {
        let mut guard = self.child.lock().await;
        let child = guard.as_mut().ok_or(RunnerError::StdinClosed)?;
        let stdin = child.stdin.as_mut().ok_or(RunnerError::StdinClosed)?;
        stdin.write_all(text.as_bytes()).await.map_err(RunnerError::Write)?;
        stdin.write_all(b"\n").await.map_err(RunnerError::Write)
    }

    async fn stop(&self) -> Result<(), RunnerError> {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            let _ = child.kill().await;
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn supports_streaming_input(&self) -> bool {
        true
    }

    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    struct FakeState {
        running: bool,
        stream_messages: Vec<String>,
        stop_count: u32,
    }

    /// In-memory runner double. `start` immediately reports `session_id`
    /// without spawning anything; events are pushed manually via
    /// `push_event` in tests that need to drive the `EventTranslator`.
    pub struct FakeRunner {
        session_id: RunnerSessionId,
        supports_streaming: bool,
        state: Mutex<FakeState>,
    }

    impl FakeRunner {
        pub fn new(session_id: impl Into<String>, supports_streaming: bool) -> Self {
            Self {
                session_id: RunnerSessionId::new(session_id.into()),
                supports_streaming,
                state: Mutex::new(FakeState { running: false, stream_messages: Vec::new(), stop_count: 0 }),
            }
        }

        pub fn stop_count(&self) -> u32 {
            self.state.lock().stop_count
        }

        pub fn stream_messages(&self) -> Vec<String> {
            self.state.lock().stream_messages.clone()
        }
    }

    #[async_trait]
    impl Runner for FakeRunner {
        async fn start(
            &self,
            _prompt: String,
            _on_event: mpsc::Sender<RunnerEvent>,
        ) -> Result<RunnerSessionId, RunnerError> {
            self.state.lock().running = true;
            Ok(self.session_id.clone())
        }

        async fn add_stream_message(&self, text: String) -> Result<(), RunnerError> {
            self.state.lock().stream_messages.push(text);
            Ok(())
        }

        async fn stop(&self) -> Result<(), RunnerError> {
            let mut state = self.state.lock();
            state.running = false;
            state.stop_count += 1;
            Ok(())
        }

        fn supports_streaming_input(&self) -> bool {
            self.supports_streaming
        }

        async fn is_running(&self) -> bool {
            self.state.lock().running
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRunner;
