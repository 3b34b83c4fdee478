// SPDX-License-Identifier: MIT

//! Session state machine (§4.3). Composes [`crate::session_store::SessionStore`]
//! and [`crate::runner_supervisor::RunnerSupervisor`] directly (both are owned
//! here), and consumes already-assembled prompt text from
//! [`crate::prompt_assembler`] — the webhook dispatcher is the layer that
//! actually calls `assemble_new_session`/`assemble_continuation`, since
//! that keeps the assembler pure and free of session-store access.

use crate::error::RuntimeError;
use crate::runner_supervisor::{RunnerOutcome, RunnerSupervisor};
use crate::session_store::SessionStore;
use cyrus_adapters::RunnerFactory;
use cyrus_core::{
    Activity, ActivityPost, AgentSession, AgentSessionId, Clock, Effect, Issue, ParentLinks, Platform, RepositoryId,
    RunnerSelection, SessionStatus, Workspace,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// §4.3's terminal-subtype routing: anything other than `"success"` is an
/// error transition.
fn is_success(subtype: Option<&str>) -> bool {
    subtype == Some("success")
}

/// Supplemented feature: stall detection. How long a session may sit
/// `active` without a runner event before the liveness timer checks
/// whether the process is actually still there.
pub(crate) const LIVENESS_INTERVAL_MS: i64 = 10 * 60 * 1000;

pub struct SessionLifecycle<F: RunnerFactory, C: Clock> {
    store: Arc<SessionStore>,
    supervisor: Arc<RunnerSupervisor<F>>,
    clock: C,
    links: Mutex<ParentLinks>,
    runner_selections: Mutex<HashMap<AgentSessionId, RunnerSelection>>,
    stop_requested: Mutex<HashSet<AgentSessionId>>,
    /// Dedupes the parent-resume protocol: a child can only trigger its
    /// parent's resume once, on its own terminal success (§4.3).
    resumed_for_child: Mutex<HashSet<AgentSessionId>>,
    effects_tx: mpsc::UnboundedSender<Effect>,
    outcomes_tx: mpsc::UnboundedSender<RunnerOutcome>,
}

impl<F: RunnerFactory, C: Clock> SessionLifecycle<F, C> {
    pub fn new(
        store: Arc<SessionStore>,
        supervisor: Arc<RunnerSupervisor<F>>,
        clock: C,
        effects_tx: mpsc::UnboundedSender<Effect>,
        outcomes_tx: mpsc::UnboundedSender<RunnerOutcome>,
    ) -> Self {
        Self {
            store,
            supervisor,
            clock,
            links: Mutex::new(ParentLinks::new()),
            runner_selections: Mutex::new(HashMap::new()),
            stop_requested: Mutex::new(HashSet::new()),
            resumed_for_child: Mutex::new(HashSet::new()),
            effects_tx,
            outcomes_tx,
        }
    }

    fn post(&self, session_id: &AgentSessionId, platform: Platform, activity: Activity) {
        if !platform.posts_activities() {
            return;
        }
        let _ = self
            .effects_tx
            .send(Effect::PostActivity { session_id: session_id.clone(), post: ActivityPost::new(activity) });
    }

    /// §4.3: "active is entered by createSession(...)". Inserts the
    /// session, posts the gated acknowledgement, and spawns its runner.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_session(
        &self,
        session_id: AgentSessionId,
        repository_id: RepositoryId,
        issue: Issue,
        workspace: Workspace,
        platform: Platform,
        selection: RunnerSelection,
        prompt: String,
        parent: Option<AgentSessionId>,
    ) -> Result<(), RuntimeError> {
        let now = self.clock.epoch_ms();
        let session = AgentSession::new(session_id.clone(), repository_id, issue, workspace, platform, now);
        self.store.upsert(session);
        self.runner_selections.lock().insert(session_id.clone(), selection.clone());
        if let Some(parent) = parent {
            self.links.lock().link(session_id.clone(), parent);
        }

        self.post(&session_id, platform, Activity::Thought { body: "Starting agent session…".to_string() });

        let runner_session_id = self
            .supervisor
            .ensure_runner(
                session_id.clone(),
                platform,
                selection,
                prompt,
                self.store.clone(),
                self.effects_tx.clone(),
                self.outcomes_tx.clone(),
            )
            .await?;
        if let Some(runner_session_id) = runner_session_id {
            self.store.update(&session_id, |s| s.runner_session_id = Some(runner_session_id.clone()));
            if let Some(selection) = self.runner_selections.lock().get_mut(&session_id) {
                selection.resume_session_id = Some(runner_session_id.as_str().to_string());
            }
        }
        self.arm_liveness_timer(&session_id);
        self.persist();
        Ok(())
    }

    fn arm_liveness_timer(&self, session_id: &AgentSessionId) {
        let _ = self
            .effects_tx
            .send(Effect::ArmLivenessTimer { session_id: session_id.clone(), after_ms: LIVENESS_INTERVAL_MS });
    }

    fn cancel_liveness_timer(&self, session_id: &AgentSessionId) {
        let _ = self.effects_tx.send(Effect::CancelLivenessTimer { session_id: session_id.clone() });
    }

    /// Re-prompts an existing, non-terminal session. Terminal sessions are
    /// a silent no-op: a stray comment on an already-finished session is
    /// not an error (invariant 6).
    pub async fn continue_session(
        &self,
        session_id: &AgentSessionId,
        prompt: String,
    ) -> Result<(), RuntimeError> {
        let Some(session) = self.store.get(session_id) else {
            return Err(RuntimeError::SessionMissing { session_id: session_id.clone() });
        };
        if session.status.is_terminal() {
            return Ok(());
        }
        let selection = self
            .runner_selections
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| RuntimeError::SessionMissing { session_id: session_id.clone() })?;

        self.store.update(session_id, |s| s.touch(self.clock.epoch_ms()));
        let runner_session_id = self
            .supervisor
            .ensure_runner(
                session_id.clone(),
                session.platform,
                selection,
                prompt,
                self.store.clone(),
                self.effects_tx.clone(),
                self.outcomes_tx.clone(),
            )
            .await?;
        if let Some(runner_session_id) = runner_session_id {
            self.store.update(session_id, |s| s.runner_session_id = Some(runner_session_id.clone()));
            if let Some(selection) = self.runner_selections.lock().get_mut(session_id) {
                selection.resume_session_id = Some(runner_session_id.as_str().to_string());
            }
        }
        self.arm_liveness_timer(session_id);
        Ok(())
    }

    /// §4.3 terminal transitions: applies a runner's terminal result,
    /// stops its runner, and triggers the parent-resume protocol on
    /// success.
    pub async fn handle_runner_outcome(&self, outcome: RunnerOutcome) -> Result<(), RuntimeError> {
        let RunnerOutcome { session_id, subtype } = outcome;
        let Some(session) = self.store.get(&session_id) else { return Ok(()) };
        if session.status.is_terminal() {
            return Ok(());
        }

        let now = self.clock.epoch_ms();
        let new_status = if is_success(subtype.as_deref()) { SessionStatus::Complete } else { SessionStatus::Error };
        self.store.update(&session_id, |s| {
            s.transition_to(new_status, now);
        });
        self.supervisor.stop(&session_id).await?;
        self.cancel_liveness_timer(&session_id);

        if new_status == SessionStatus::Complete {
            self.resume_parent_if_any(&session_id).await?;
        }

        self.persist();
        Ok(())
    }

    async fn resume_parent_if_any(&self, child_session_id: &AgentSessionId) -> Result<(), RuntimeError> {
        if !self.resumed_for_child.lock().insert(child_session_id.clone()) {
            return Ok(());
        }
        let Some(parent_id) = self.links.lock().parent_of(child_session_id).cloned() else { return Ok(()) };
        let message = format!(
            "Child agent session, with ID {child_session_id} completed with result:\n\n{}",
            last_response_body(&self.store, child_session_id)
        );
        self.continue_session(&parent_id, message).await
    }

    /// §4.3 stop transition: marks the target and every descendant
    /// stopped (BFS via `ParentLinks`), stops each runner at most once,
    /// and posts exactly one visible "stopped" response — for the
    /// originally-targeted session only.
    pub async fn request_stop(&self, session_id: &AgentSessionId) -> Result<(), RuntimeError> {
        self.stop_internal(session_id, true).await
    }

    /// Same propagation as [`Self::request_stop`] but posts no activity —
    /// §6 `issue-unassigned`: "no tracker feedback is posted".
    pub async fn request_stop_silent(&self, session_id: &AgentSessionId) -> Result<(), RuntimeError> {
        self.stop_internal(session_id, false).await
    }

    async fn stop_internal(&self, session_id: &AgentSessionId, post_response: bool) -> Result<(), RuntimeError> {
        let descendants = self.links.lock().descendants_including_self(session_id);
        let now = self.clock.epoch_ms();

        for id in &descendants {
            if !self.stop_requested.lock().insert(id.clone()) {
                continue;
            }
            self.store.update(id, |s| {
                s.transition_to(SessionStatus::Stopped, now);
            });
            self.supervisor.stop(id).await?;
            self.cancel_liveness_timer(id);
        }

        if post_response {
            if let Some(session) = self.store.get(session_id) {
                self.post(session_id, session.platform, Activity::Response { body: "Session stopped.".to_string() });
            }
        }
        self.persist();
        Ok(())
    }

    /// Clones of every piece of lifecycle state not already covered by
    /// `SessionStore`, for §4.7 snapshotting. Kept as one bundle rather
    /// than three accessors so callers can't forget one field.
    pub fn export_state(&self) -> LifecycleState {
        LifecycleState {
            runner_selections: self.runner_selections.lock().clone(),
            links: self.links.lock().clone(),
            stop_requested: self.stop_requested.lock().clone(),
        }
    }

    pub fn import_state(&self, state: LifecycleState) {
        *self.runner_selections.lock() = state.runner_selections;
        let mut links = state.links;
        links.rebuild_index();
        *self.links.lock() = links;
        *self.stop_requested.lock() = state.stop_requested;
    }

    fn persist(&self) {
        let _ = self.effects_tx.send(Effect::PersistSnapshot);
    }
}

#[derive(Debug, Clone, Default)]
pub struct LifecycleState {
    pub runner_selections: HashMap<AgentSessionId, RunnerSelection>,
    pub links: ParentLinks,
    pub stop_requested: HashSet<AgentSessionId>,
}

/// Best-effort transcript lookup for the parent-resume synthesized
/// message: the last posted `Response`/`Error` body for the child, or a
/// generic fallback if nothing was ever posted (non-tracker platform).
fn last_response_body(store: &SessionStore, session_id: &AgentSessionId) -> String {
    store
        .entries(session_id)
        .iter()
        .rev()
        .find_map(|e| if matches!(e.entry_type, cyrus_core::EntryType::Result) { Some(e.content.clone()) } else { None })
        .unwrap_or_else(|| "(no response recorded)".to_string())
}
