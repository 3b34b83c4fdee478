// SPDX-License-Identifier: MIT

//! Runner process lifecycle per session (§4.4). Depends on
//! [`crate::event_translator::EventTranslator`] to turn a runner's event
//! stream into tracker activities, and hands the result off as
//! [`cyrus_core::Effect::PostActivity`] values rather than posting
//! directly — keeping this module ignorant of how (or whether) an
//! activity actually reaches the tracker.

use crate::error::RuntimeError;
use crate::event_translator::EventTranslator;
use crate::session_store::SessionStore;
use cyrus_adapters::{Runner, RunnerFactory};
use cyrus_core::{AgentSessionId, Effect, Platform, RunnerEvent, RunnerSelection, RunnerSessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// §5: how long `stop` waits for in-flight events to drain before giving
/// up on the forwarder task.
const DRAIN_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOutcome {
    pub session_id: AgentSessionId,
    /// e.g. `Some("success")`, `Some("error_max_turns")`.
    pub subtype: Option<String>,
}

struct RunnerHandle {
    runner: Arc<dyn Runner>,
    forwarder: JoinHandle<()>,
    /// Set just before `stop` asks the runner to exit, so a `RuntimeError`
    /// event racing in during the drain window is dropped rather than
    /// posted (§4.4: "after a stop has been requested, the error is
    /// suppressed").
    stop_requested: Arc<AtomicBool>,
}

pub struct RunnerSupervisor<F: RunnerFactory> {
    factory: F,
    handles: Mutex<HashMap<AgentSessionId, RunnerHandle>>,
}

impl<F: RunnerFactory> RunnerSupervisor<F> {
    pub fn new(factory: F) -> Self {
        Self { factory, handles: Mutex::new(HashMap::new()) }
    }

    /// Streams into the already-running runner for `session_id` when one
    /// exists and supports streaming input; otherwise spawns a fresh one
    /// via the configured [`RunnerFactory`], resuming via
    /// `selection.resume_session_id` when set. Returns the runner's own
    /// session id when a new process was started (§4.4: "on first session
    /// event the session's runnerSessionId is recorded"); `None` when an
    /// existing stream was reused, since no new native session was born.
    pub async fn ensure_runner(
        &self,
        session_id: AgentSessionId,
        platform: Platform,
        selection: RunnerSelection,
        prompt: String,
        store: Arc<SessionStore>,
        effects_tx: mpsc::UnboundedSender<Effect>,
        outcomes_tx: mpsc::UnboundedSender<RunnerOutcome>,
    ) -> Result<Option<RunnerSessionId>, RuntimeError> {
        let existing = { self.handles.lock().get(&session_id).map(|h| h.runner.clone()) };
        if let Some(runner) = existing {
            if runner.supports_streaming_input() && runner.is_running().await {
                return runner
                    .add_stream_message(prompt)
                    .await
                    .map(|()| None)
                    .map_err(|e| RuntimeError::RunnerRuntimeError { session_id: session_id.clone(), message: e.to_string() });
            }
        }

        let runner = self.factory.create(&selection).await;
        let (tx, rx) = mpsc::channel(256);
        let translator = Arc::new(Mutex::new(EventTranslator::new()));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let forwarder = tokio::spawn(forward_events(
            session_id.clone(),
            platform,
            translator,
            rx,
            store,
            effects_tx,
            outcomes_tx,
            stop_requested.clone(),
        ));

        let started = runner.start(prompt, tx).await;
        match started {
            Ok(runner_session_id) => {
                self.handles.lock().insert(session_id, RunnerHandle { runner, forwarder, stop_requested });
                Ok(Some(runner_session_id))
            }
            Err(e) => {
                forwarder.abort();
                Err(RuntimeError::RunnerSpawnError { session_id, message: e.to_string() })
            }
        }
    }

    /// Idempotent: stopping a session with no runner handle is a no-op,
    /// matching §4.4's "stop is safe to call more than once".
    pub async fn stop(&self, session_id: &AgentSessionId) -> Result<(), RuntimeError> {
        let handle = self.handles.lock().remove(session_id);
        let Some(handle) = handle else { return Ok(()) };
        handle.stop_requested.store(true, Ordering::SeqCst);
        handle.runner.stop().await.map_err(|e| RuntimeError::RunnerRuntimeError {
            session_id: session_id.clone(),
            message: e.to_string(),
        })?;
        let _ = tokio::time::timeout(DRAIN_WINDOW, handle.forwarder).await;
        Ok(())
    }

    pub async fn is_running(&self, session_id: &AgentSessionId) -> bool {
        let runner = { self.handles.lock().get(session_id).map(|h| h.runner.clone()) };
        match runner {
            Some(r) => r.is_running().await,
            None => false,
        }
    }
}

async fn forward_events(
    session_id: AgentSessionId,
    platform: Platform,
    translator: Arc<Mutex<EventTranslator>>,
    mut rx: mpsc::Receiver<RunnerEvent>,
    store: Arc<SessionStore>,
    effects_tx: mpsc::UnboundedSender<Effect>,
    outcomes_tx: mpsc::UnboundedSender<RunnerOutcome>,
    stop_requested: Arc<AtomicBool>,
) {
    while let Some(event) = rx.recv().await {
        if matches!(event, RunnerEvent::RuntimeError { .. }) && stop_requested.load(Ordering::SeqCst) {
            continue;
        }
        record_metadata(&store, &session_id, &event);
        if platform.posts_activities() {
            let posts = translator.lock().translate(&event);
            for post in posts {
                if effects_tx.send(Effect::PostActivity { session_id: session_id.clone(), post }).is_err() {
                    return;
                }
            }
        }
        if let RunnerEvent::Final { subtype, .. } = &event {
            let _ = outcomes_tx.send(RunnerOutcome { session_id: session_id.clone(), subtype: subtype.clone() });
        }
    }
}

/// Mirrors model, tools invoked, and usage/cost onto the session record
/// as the runner's own event stream reports them.
fn record_metadata(store: &SessionStore, session_id: &AgentSessionId, event: &RunnerEvent) {
    match event {
        RunnerEvent::SystemInit { model: Some(model) } => {
            let model = model.clone();
            store.update(session_id, |s| s.metadata.model = Some(model));
        }
        RunnerEvent::AssistantToolUse { tool_name, .. } => {
            let tool_name = tool_name.clone();
            store.update(session_id, |s| {
                if !s.metadata.tools.contains(&tool_name) {
                    s.metadata.tools.push(tool_name);
                }
            });
        }
        RunnerEvent::Final { usage: Some(usage), .. } => {
            let usage = *usage;
            store.update(session_id, |s| {
                s.metadata.input_tokens = usage.input_tokens;
                s.metadata.output_tokens = usage.output_tokens;
                s.metadata.cost_usd = usage.cost_usd;
            });
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cyrus_core::{PromptType, RunnerType};

    #[derive(Clone)]
    struct FixedFactory {
        runner: Arc<cyrus_adapters::FakeRunner>,
    }

    #[async_trait]
    impl RunnerFactory for FixedFactory {
        async fn create(&self, _selection: &RunnerSelection) -> Arc<dyn Runner> {
            self.runner.clone()
        }
    }

    fn selection() -> RunnerSelection {
        RunnerSelection {
            runner_type: RunnerType::Claude,
            model: None,
            resume_session_id: None,
            permissions: vec![],
            prompt_type: PromptType::Fallback,
        }
    }

    #[tokio::test]
    async fn ensure_runner_spawns_once_and_streams_on_second_call() {
        let fake = Arc::new(cyrus_adapters::FakeRunner::new("native-1", true));
        let supervisor = RunnerSupervisor::new(FixedFactory { runner: fake.clone() });
        let (effects_tx, _effects_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, _outcomes_rx) = mpsc::unbounded_channel();

        let store = Arc::new(SessionStore::new());
        supervisor
            .ensure_runner(
                AgentSessionId::new("s1"),
                Platform::Tracker,
                selection(),
                "first prompt".into(),
                store.clone(),
                effects_tx.clone(),
                outcomes_tx.clone(),
            )
            .await
            .unwrap();
        assert!(supervisor.is_running(&AgentSessionId::new("s1")).await);

        supervisor
            .ensure_runner(
                AgentSessionId::new("s1"),
                Platform::Tracker,
                selection(),
                "second prompt".into(),
                store,
                effects_tx,
                outcomes_tx,
            )
            .await
            .unwrap();

        assert_eq!(fake.stream_messages(), vec!["second prompt".to_string()]);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let fake = Arc::new(cyrus_adapters::FakeRunner::new("native-1", true));
        let supervisor = RunnerSupervisor::new(FixedFactory { runner: fake.clone() });
        let (effects_tx, _effects_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, _outcomes_rx) = mpsc::unbounded_channel();

        let store = Arc::new(SessionStore::new());
        supervisor
            .ensure_runner(AgentSessionId::new("s1"), Platform::Tracker, selection(), "p".into(), store, effects_tx, outcomes_tx)
            .await
            .unwrap();

        supervisor.stop(&AgentSessionId::new("s1")).await.unwrap();
        supervisor.stop(&AgentSessionId::new("s1")).await.unwrap();
        assert!(!supervisor.is_running(&AgentSessionId::new("s1")).await);
    }

    #[tokio::test]
    async fn non_tracker_platform_still_reports_final_outcome_without_posting_activities() {
        let fake = Arc::new(cyrus_adapters::FakeRunner::new("native-1", true));
        let supervisor = RunnerSupervisor::new(FixedFactory { runner: fake.clone() });
        let (effects_tx, mut effects_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, mut outcomes_rx) = mpsc::unbounded_channel();

        let store = Arc::new(SessionStore::new());
        supervisor
            .ensure_runner(AgentSessionId::new("s1"), Platform::Cli, selection(), "p".into(), store, effects_tx, outcomes_tx)
            .await
            .unwrap();

        assert!(effects_rx.try_recv().is_err());
        drop(outcomes_rx.try_recv());
        let _ = effects_rx;
    }

    /// A runner double that hands its `on_event` sender back out so a test
    /// can push events after `start` returns, the way a real subprocess
    /// would race a stop request against an in-flight error.
    struct EmittingRunner {
        session_id: cyrus_core::RunnerSessionId,
        events_tx: Mutex<Option<mpsc::Sender<RunnerEvent>>>,
    }

    #[async_trait]
    impl Runner for EmittingRunner {
        async fn start(
            &self,
            _prompt: String,
            on_event: mpsc::Sender<RunnerEvent>,
        ) -> Result<cyrus_core::RunnerSessionId, cyrus_adapters::RunnerError> {
            *self.events_tx.lock() = Some(on_event);
            Ok(self.session_id.clone())
        }

        async fn add_stream_message(&self, _text: String) -> Result<(), cyrus_adapters::RunnerError> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), cyrus_adapters::RunnerError> {
            Ok(())
        }

        fn supports_streaming_input(&self) -> bool {
            true
        }

        async fn is_running(&self) -> bool {
            true
        }
    }

    #[derive(Clone)]
    struct EmittingFactory {
        runner: Arc<EmittingRunner>,
    }

    #[async_trait]
    impl RunnerFactory for EmittingFactory {
        async fn create(&self, _selection: &RunnerSelection) -> Arc<dyn Runner> {
            self.runner.clone()
        }
    }

    #[tokio::test]
    async fn runtime_error_after_stop_is_suppressed() {
        let runner = Arc::new(EmittingRunner {
            session_id: cyrus_core::RunnerSessionId::new("native-1"),
            events_tx: Mutex::new(None),
        });
        let supervisor = RunnerSupervisor::new(EmittingFactory { runner: runner.clone() });
        let (effects_tx, mut effects_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, _outcomes_rx) = mpsc::unbounded_channel();

        let store = Arc::new(SessionStore::new());
        supervisor
            .ensure_runner(AgentSessionId::new("s1"), Platform::Tracker, selection(), "p".into(), store, effects_tx, outcomes_tx)
            .await
            .unwrap();

        let events_tx = runner.events_tx.lock().clone().unwrap();
        supervisor.stop(&AgentSessionId::new("s1")).await.unwrap();
        events_tx.send(RunnerEvent::RuntimeError { message: "late failure".into() }).await.unwrap();
        drop(events_tx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(effects_rx.try_recv().is_err());
    }
}
