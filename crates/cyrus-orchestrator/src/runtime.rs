// SPDX-License-Identifier: MIT

//! Webhook dispatch (§6): the glue between an inbound [`WebhookEvent`] and
//! [`crate::router::route`] / [`SessionLifecycle`]. `Runtime` owns the
//! receiving end of the effect channel and is the only thing that ever
//! calls the tracker/persistence adapters — every other component only
//! ever produces an [`Effect`] for it to interpret.

use crate::error::RuntimeError;
use crate::lifecycle::{LifecycleState, SessionLifecycle};
use crate::persistence::{Persistence, Snapshot};
use crate::prompt_assembler::{self, ContinuationRequest, NewSessionRequest};
use crate::router::{self, RoutingDecision};
use crate::runner_supervisor::{RunnerOutcome, RunnerSupervisor};
use crate::session_store::{SessionStore, SessionStoreSnapshot};
use cyrus_adapters::{IssueTrackerService, RunnerFactory, WorkspaceProvider};
use cyrus_core::{
    Activity, ActivityPost, AgentSessionId, Clock, Effect, ElicitationOption, EntryMetadata, EntryType, Issue,
    IssueId, IssueRepositoryCache, Platform, PendingSelection, PendingSelectionId, PromptType, Repository,
    RepositoryId, RunnerSelection, RunnerType, SessionEntry, SessionStatus, WebhookEvent, DEFAULT_SELECTION_TTL_MS,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// §3's terminal-session TTL: how long a `Complete`/`Error`/`Stopped`
/// session is kept around before `run_cleanup_sweep` drops it.
pub const CLEANUP_RETENTION_MS: i64 = 24 * 60 * 60 * 1000;

/// Everything needed to finish creating a session once a pending
/// repository elicitation is answered — the webhook that triggered
/// routing carries fields (issue snapshot, guidance) that no longer exist
/// once that webhook has been processed, so we park them here.
#[derive(Debug, Clone)]
struct PendingCreation {
    issue: Issue,
    guidance: Option<String>,
}

pub struct Runtime<T: IssueTrackerService, F: RunnerFactory, W: WorkspaceProvider, C: Clock> {
    repositories: Vec<Repository>,
    tracker: T,
    workspace_provider: W,
    store: Arc<SessionStore>,
    supervisor: Arc<RunnerSupervisor<F>>,
    lifecycle: Arc<SessionLifecycle<F, C>>,
    clock: C,
    persistence: Arc<Persistence>,
    issue_repo_cache: Arc<Mutex<IssueRepositoryCache>>,
    pending_selections: Arc<Mutex<HashMap<PendingSelectionId, PendingSelection>>>,
    pending_creations: Arc<Mutex<HashMap<AgentSessionId, PendingCreation>>>,
    effects_tx: mpsc::UnboundedSender<Effect>,
    liveness_timers: Arc<Mutex<HashMap<AgentSessionId, JoinHandle<()>>>>,
}

impl<T: IssueTrackerService, F: RunnerFactory, W: WorkspaceProvider, C: Clock> Runtime<T, F, W, C> {
    /// Wires every collaborator together and restores persisted state
    /// before returning — callers must not dispatch a webhook until this
    /// has completed (§4.7: "restore happens once at startup, before any
    /// webhook is accepted").
    pub async fn bootstrap(
        repositories: Vec<Repository>,
        tracker: T,
        runner_factory: F,
        workspace_provider: W,
        clock: C,
        persistence: Persistence,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RunnerOutcome>), RuntimeError> {
        let snapshot = persistence.restore().await?;

        let mut store_snapshot = crate::session_store::SessionStoreSnapshot::default();
        for repo_sessions in snapshot.repositories.into_values() {
            store_snapshot.sessions.extend(repo_sessions.sessions);
            store_snapshot.entries.extend(repo_sessions.entries);
        }
        let store = Arc::new(SessionStore::restore(store_snapshot));
        let supervisor = Arc::new(RunnerSupervisor::new(runner_factory));

        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let lifecycle =
            Arc::new(SessionLifecycle::new(store.clone(), supervisor.clone(), clock.clone(), effects_tx.clone(), outcomes_tx));
        let mut links = snapshot.child_to_parent_links;
        links.retain_existing(|id| store.get(id).is_some());
        lifecycle.import_state(LifecycleState {
            runner_selections: snapshot.session_runner_selections,
            links,
            stop_requested: snapshot.stop_requested_sessions,
        });

        let runtime = Self {
            repositories,
            tracker,
            workspace_provider,
            store,
            supervisor,
            lifecycle,
            clock,
            persistence: Arc::new(persistence),
            issue_repo_cache: Arc::new(Mutex::new(snapshot.issue_repository_cache)),
            pending_selections: Arc::new(Mutex::new(snapshot.pending_selections)),
            pending_creations: Arc::new(Mutex::new(HashMap::new())),
            effects_tx,
            liveness_timers: Arc::new(Mutex::new(HashMap::new())),
        };
        runtime.spawn_effect_loop(effects_rx);
        Ok((runtime, outcomes_rx))
    }

    /// Supplemented feature: terminal-session cleanup sweep (§3's TTL,
    /// made callable on demand or from a caller-driven timer rather than
    /// only ever running implicitly). Drops entries/sessions for anything
    /// that finished more than `older_than_ms` ago and persists the
    /// result.
    pub async fn run_cleanup_sweep(&self, older_than_ms: i64) -> Result<Vec<AgentSessionId>, RuntimeError> {
        let now = self.clock.epoch_ms();
        let removed = self.store.cleanup(now, older_than_ms);
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "cleanup sweep removed terminal sessions");
            self.persistence
                .save(&self.export_snapshot())
                .await?;
        }
        Ok(removed)
    }

    fn export_snapshot(&self) -> Snapshot {
        build_snapshot(
            &self.repositories,
            &self.store,
            self.lifecycle.export_state(),
            &self.issue_repo_cache,
            &self.pending_selections,
        )
    }

    /// Drains `PostActivity`/`PersistSnapshot` effects produced by
    /// [`SessionLifecycle`] and [`RunnerSupervisor`], which never touch
    /// the tracker or disk directly. Every captured handle is the same
    /// `Arc` held by `self`, so a save here always reflects the latest
    /// state, not a point-in-time copy.
    fn spawn_effect_loop(&self, mut effects_rx: mpsc::UnboundedReceiver<Effect>) {
        let tracker = self.tracker.clone();
        let store = self.store.clone();
        let lifecycle = self.lifecycle.clone();
        let supervisor = self.supervisor.clone();
        let issue_repo_cache = self.issue_repo_cache.clone();
        let pending_selections = self.pending_selections.clone();
        let persistence = self.persistence.clone();
        let repositories = self.repositories.clone();
        let liveness_timers = self.liveness_timers.clone();
        let effects_tx = self.effects_tx.clone();

        tokio::spawn(async move {
            while let Some(effect) = effects_rx.recv().await {
                tracing::debug!(effect = effect.name(), fields = ?effect.fields(), "handling effect");
                match effect {
                    Effect::PostActivity { session_id, post } => match tracker.create_agent_activity(&session_id, &post).await {
                        Ok(activity_id) => {
                            let entry = SessionEntry {
                                entry_type: entry_type_for(&post.activity),
                                content: entry_content_for(&post.activity),
                                metadata: EntryMetadata::default(),
                                tracker_activity_id: Some(activity_id),
                            };
                            store.append_entry_if_posted(&session_id, entry);
                        }
                        Err(e) => tracing::warn!(session_id = %session_id, error = %e, "failed to post activity"),
                    },
                    Effect::PersistSnapshot => {
                        let snapshot = build_snapshot(&repositories, &store, lifecycle.export_state(), &issue_repo_cache, &pending_selections);
                        if let Err(e) = persistence.save(&snapshot).await {
                            tracing::error!(error = %e, "failed to persist snapshot");
                        }
                    }
                    Effect::ArmLivenessTimer { session_id, after_ms } => {
                        let handle = spawn_liveness_timer(
                            session_id.clone(),
                            after_ms,
                            store.clone(),
                            supervisor.clone(),
                            lifecycle.clone(),
                            effects_tx.clone(),
                        );
                        if let Some(previous) = liveness_timers.lock().insert(session_id, handle) {
                            previous.abort();
                        }
                    }
                    Effect::CancelLivenessTimer { session_id } => {
                        if let Some(handle) = liveness_timers.lock().remove(&session_id) {
                            handle.abort();
                        }
                    }
                }
            }
        });
    }

    async fn load_role_prompt(&self, repository: &Repository, issue_labels: &[String]) -> Option<String> {
        let role = repository.matching_role(issue_labels)?;
        tokio::fs::read_to_string(&role.prompt_path).await.ok()
    }

    fn default_selection(&self) -> RunnerSelection {
        RunnerSelection {
            runner_type: RunnerType::Claude,
            model: None,
            resume_session_id: None,
            permissions: vec![],
            prompt_type: PromptType::Fallback,
        }
    }

    fn repository(&self, id: &RepositoryId) -> Option<&Repository> {
        self.repositories.iter().find(|r| &r.id == id)
    }

    fn active_sessions_for_issue(&self, issue_id: &IssueId) -> Vec<RepositoryId> {
        self.store.list_active_by_issue(issue_id).into_iter().map(|s| s.repository_id).collect()
    }

    /// Entry point for every inbound webhook (§6 dispatch table).
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<(), RuntimeError> {
        match event {
            WebhookEvent::SessionCreated {
                agent_session_id, issue_id, issue_identifier, team_key, project_key, labels, guidance, ..
            } => {
                let issue = Issue {
                    id: issue_id,
                    identifier: issue_identifier,
                    title: String::new(),
                    description: None,
                    url: None,
                    branch_name: None,
                    labels: labels.unwrap_or_default(),
                    team_key,
                    project_name: project_key,
                };
                self.route_and_create(agent_session_id, issue, guidance).await
            }
            WebhookEvent::SessionPrompted { agent_session_id, issue_id, activity, .. } => {
                if activity.signal.as_deref() == Some("stop") {
                    return self.lifecycle.request_stop(&agent_session_id).await;
                }
                if self.try_resolve_pending_selection(&agent_session_id, &activity.body).await? {
                    return Ok(());
                }
                self.continue_or_recover(&agent_session_id, &issue_id, activity.body).await
            }
            WebhookEvent::IssueAssigned { issue_id, .. } => {
                let body = "This issue was assigned to you.".to_string();
                for session in self.store.list_active_by_issue(&issue_id) {
                    self.continue_or_recover(&session.session_id, &issue_id, body.clone()).await?;
                }
                Ok(())
            }
            WebhookEvent::IssueUnassigned { issue_id, .. } => {
                for session in self.store.list_active_by_issue(&issue_id) {
                    self.lifecycle.request_stop_silent(&session.session_id).await?;
                }
                Ok(())
            }
            WebhookEvent::IssueStatusChanged { issue_id, to_state, .. } => {
                // §9 Open Question: re-evaluating a parent issue's orchestrator
                // session on a child's terminal status change requires an
                // adapter call (fetch/comment on an arbitrary issue) that
                // `IssueTrackerService` doesn't expose; logged, not acted on.
                tracing::info!(issue_id = %issue_id, to_state = %to_state, "issue status changed; no parent re-evaluation adapter available");
                Ok(())
            }
        }
    }

    async fn route_and_create(
        &self,
        session_id: AgentSessionId,
        issue: Issue,
        guidance: Option<String>,
    ) -> Result<(), RuntimeError> {
        let active = self.active_sessions_for_issue(&issue.id);
        let decision = router::route(&self.repositories, &issue, &active, &self.issue_repo_cache.lock());
        match decision {
            RoutingDecision::Routed(repository_id) => self.finish_create_session(session_id, repository_id, issue, guidance).await,
            RoutingDecision::NeedsSelection { candidates } => {
                self.park_pending_selection(session_id, issue, guidance, candidates);
                Ok(())
            }
            RoutingDecision::NoRoutableRepository => {
                self.post_unrouted_error(&session_id, &issue.id);
                Ok(())
            }
        }
    }

    fn park_pending_selection(&self, session_id: AgentSessionId, issue: Issue, guidance: Option<String>, candidates: Vec<RepositoryId>) {
        let now = self.clock.epoch_ms();
        let pending = PendingSelection { id: PendingSelectionId::new(), agent_session_id: session_id.clone(), candidates: candidates.clone(), created_at_ms: now };
        self.pending_selections.lock().insert(pending.id.clone(), pending);
        self.pending_creations.lock().insert(session_id.clone(), PendingCreation { issue, guidance });

        let options = candidates
            .iter()
            .filter_map(|id| self.repository(id))
            .map(|r| ElicitationOption { value: r.elicitation_label().to_string() })
            .collect();
        let _ = self.effects_tx.send(Effect::PostActivity {
            session_id,
            post: ActivityPost::new(Activity::Elicitation {
                body: "Multiple repositories could handle this issue — which one should I use?".to_string(),
                options,
            }),
        });
    }

    fn post_unrouted_error(&self, session_id: &AgentSessionId, issue_id: &IssueId) {
        tracing::warn!(issue_id = %issue_id, "no routable repository");
        let _ = self.effects_tx.send(Effect::PostActivity {
            session_id: session_id.clone(),
            post: ActivityPost::new(Activity::Error { body: "No repository is configured to handle this issue.".to_string() }),
        });
    }

    /// Resolves a pending repository elicitation if `session_id` has one
    /// and `body` names one of its candidates. Expired elicitations
    /// (§9: 24h TTL) are dropped silently rather than resolved.
    async fn try_resolve_pending_selection(&self, session_id: &AgentSessionId, body: &str) -> Result<bool, RuntimeError> {
        let pending = {
            let mut pending_selections = self.pending_selections.lock();
            let Some((id, _)) = pending_selections.iter().find(|(_, p)| &p.agent_session_id == session_id) else {
                return Ok(false);
            };
            let id = id.clone();
            pending_selections.remove(&id)
        };
        let Some(pending) = pending else { return Ok(false) };
        let Some(creation) = self.pending_creations.lock().remove(session_id) else { return Ok(false) };

        if pending.is_expired(self.clock.epoch_ms(), DEFAULT_SELECTION_TTL_MS) {
            return Ok(true);
        }

        let chosen = pending.candidates.iter().find(|id| {
            self.repository(id).map(|r| r.elicitation_label().eq_ignore_ascii_case(body.trim())).unwrap_or(false)
        });
        let Some(repository_id) = chosen else {
            // Not a recognizable answer; re-park it so a later comment can still resolve it.
            self.pending_selections.lock().insert(pending.id.clone(), pending);
            self.pending_creations.lock().insert(session_id.clone(), creation);
            return Ok(true);
        };

        self.finish_create_session(session_id.clone(), repository_id.clone(), creation.issue, creation.guidance).await?;
        Ok(true)
    }

    async fn finish_create_session(
        &self,
        session_id: AgentSessionId,
        repository_id: RepositoryId,
        issue: Issue,
        guidance: Option<String>,
    ) -> Result<(), RuntimeError> {
        let Some(repository) = self.repository(&repository_id) else {
            return Err(RuntimeError::RoutingError { issue_id: issue.id });
        };
        let workspace = self
            .workspace_provider
            .create_workspace(&issue, repository)
            .await
            .map_err(|e| RuntimeError::WorkspaceError { session_id: session_id.clone(), message: e.to_string() })?;

        let role_prompt = self.load_role_prompt(repository, &issue.labels).await;
        let request = NewSessionRequest {
            issue_labels: issue.labels.clone(),
            user_comment: guidance,
            is_mention_triggered: false,
            is_label_based_prompt_requested: false,
            subroutine_prompt: None,
        };
        let assembled = prompt_assembler::assemble_new_session(&request, repository, |_| role_prompt.clone());
        let mut selection = self.default_selection();
        selection.prompt_type = assembled.metadata.prompt_type;

        self.issue_repo_cache.lock().remember(issue.id.clone(), repository_id.clone());
        self.lifecycle
            .create_session(session_id, repository_id, issue, workspace, Platform::Tracker, selection, assembled.user_prompt, None)
            .await
    }

    /// Continues an existing session, or — if the store has forgotten it
    /// (§7 `SessionMissing`) — re-routes and rebuilds it from scratch so a
    /// stray comment on a session lost across a restart still gets a
    /// response instead of silently vanishing (S6).
    async fn continue_or_recover(&self, session_id: &AgentSessionId, issue_id: &IssueId, body: String) -> Result<(), RuntimeError> {
        let is_streaming = self.supervisor.is_running(session_id).await;
        let request =
            ContinuationRequest { user_comment: body.clone(), attachment_manifest: None, is_subroutine_transition: false, timestamp_ms: self.clock.epoch_ms() };
        let assembled = prompt_assembler::assemble_continuation(&request, is_streaming);

        match self.lifecycle.continue_session(session_id, assembled.user_prompt).await {
            Ok(()) => Ok(()),
            Err(RuntimeError::SessionMissing { .. }) => self.recover_missing_session(session_id, issue_id, body).await,
            Err(e) => Err(e),
        }
    }

    /// S6 missing-session recovery: the store has forgotten this session
    /// (e.g. a restart lost it before a snapshot caught it). Refetches the
    /// issue from the tracker, re-routes it exactly as a fresh
    /// `session-created` would (team/label/catch-all fallback, since no
    /// active session exists to pin against), and rebuilds a replacement
    /// session continuing from the comment that arrived for the missing
    /// one. If the issue itself can no longer be fetched there is nothing
    /// to route from, so a sanitized error is posted instead.
    async fn recover_missing_session(&self, session_id: &AgentSessionId, issue_id: &IssueId, body: String) -> Result<(), RuntimeError> {
        let issue = match self.tracker.fetch_issue(issue_id).await {
            Ok(issue) => issue,
            Err(e) => {
                let _ = self.effects_tx.send(Effect::PostActivity {
                    session_id: session_id.clone(),
                    post: ActivityPost::new(Activity::Error {
                        body: crate::error::sanitize(&format!("session {session_id} could not be found and its issue could not be refetched: {e}")),
                    }),
                });
                return Ok(());
            }
        };

        let active = self.active_sessions_for_issue(&issue.id);
        let decision = router::route(&self.repositories, &issue, &active, &self.issue_repo_cache.lock());
        match decision {
            RoutingDecision::Routed(repository_id) => {
                self.recreate_session_for_recovery(session_id.clone(), repository_id, issue, body).await
            }
            RoutingDecision::NeedsSelection { candidates } => {
                self.park_pending_selection(session_id.clone(), issue, Some(body), candidates);
                Ok(())
            }
            RoutingDecision::NoRoutableRepository => {
                self.post_unrouted_error(session_id, &issue.id);
                Ok(())
            }
        }
    }

    /// Rebuilds a session record for a replacement run, continuing from
    /// `body` rather than assembling a brand-new-session prompt, then
    /// posts a visible acknowledgement that this is a replacement (S6).
    async fn recreate_session_for_recovery(
        &self,
        session_id: AgentSessionId,
        repository_id: RepositoryId,
        issue: Issue,
        body: String,
    ) -> Result<(), RuntimeError> {
        let Some(repository) = self.repository(&repository_id) else {
            return Err(RuntimeError::RoutingError { issue_id: issue.id });
        };
        let workspace = self
            .workspace_provider
            .create_workspace(&issue, repository)
            .await
            .map_err(|e| RuntimeError::WorkspaceError { session_id: session_id.clone(), message: e.to_string() })?;

        let request = ContinuationRequest { user_comment: body, attachment_manifest: None, is_subroutine_transition: false, timestamp_ms: self.clock.epoch_ms() };
        let assembled = prompt_assembler::assemble_continuation(&request, false);
        let mut selection = self.default_selection();
        selection.prompt_type = assembled.metadata.prompt_type;

        self.issue_repo_cache.lock().remember(issue.id.clone(), repository_id.clone());
        self.lifecycle
            .create_session(session_id.clone(), repository_id, issue, workspace, Platform::Tracker, selection, assembled.user_prompt, None)
            .await?;

        let _ = self.effects_tx.send(Effect::PostActivity {
            session_id,
            post: ActivityPost::new(Activity::Response {
                body: "Your previous session could not be found, so I started a new one to continue.".to_string(),
            }),
        });
        Ok(())
    }

    /// Saves the current snapshot immediately (e.g. for a graceful
    /// shutdown path in `cyrus-daemon`) rather than waiting for the next
    /// `PersistSnapshot` effect to drain.
    pub async fn save_now(&self) -> Result<(), RuntimeError> {
        self.persistence.save(&self.export_snapshot()).await
    }

    /// Drives an outcome coming off the supervisor's channel into the
    /// lifecycle state machine. Callers own the receive loop (typically
    /// `cyrus-daemon`'s main task) so outcome handling interleaves with
    /// webhook dispatch on the same executor.
    pub async fn handle_runner_outcome(&self, outcome: RunnerOutcome) -> Result<(), RuntimeError> {
        self.lifecycle.handle_runner_outcome(outcome).await
    }
}

/// Supplemented feature: stall detection. Spawns the sleep for one
/// liveness window; on fire, re-arms if the runner is still reporting as
/// running (a session can legitimately sit quiet for a while mid-turn)
/// or else synthesizes the terminal transition a dead process never got
/// to emit itself.
fn spawn_liveness_timer<F: RunnerFactory, C: Clock>(
    session_id: AgentSessionId,
    after_ms: i64,
    store: Arc<SessionStore>,
    supervisor: Arc<RunnerSupervisor<F>>,
    lifecycle: Arc<SessionLifecycle<F, C>>,
    effects_tx: mpsc::UnboundedSender<Effect>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(after_ms.max(0) as u64)).await;

        let Some(session) = store.get(&session_id) else { return };
        if session.status.is_terminal() {
            return;
        }

        if supervisor.is_running(&session_id).await {
            let _ = effects_tx.send(Effect::ArmLivenessTimer { session_id, after_ms: crate::lifecycle::LIVENESS_INTERVAL_MS });
            return;
        }

        tracing::warn!(session_id = %session_id, "liveness timeout: runner process is gone without a terminal event");
        let _ = lifecycle
            .handle_runner_outcome(RunnerOutcome { session_id, subtype: Some("error_runtime".to_string()) })
            .await;
    })
}

/// Shared by `Runtime::export_snapshot` and the `PersistSnapshot` effect
/// handler (which runs detached from `self`, so it only has the cloned
/// handles it captured) — one place that knows every `Snapshot` field.
fn build_snapshot(
    repositories: &[Repository],
    store: &SessionStore,
    lifecycle_state: LifecycleState,
    issue_repo_cache: &Mutex<IssueRepositoryCache>,
    pending_selections: &Mutex<HashMap<PendingSelectionId, PendingSelection>>,
) -> Snapshot {
    let full = store.snapshot();
    let mut repositories_snapshot = HashMap::new();
    for repo in repositories {
        let sessions: HashMap<_, _> =
            full.sessions.iter().filter(|(_, s)| s.repository_id == repo.id).map(|(id, s)| (id.clone(), s.clone())).collect();
        let entries: HashMap<_, _> = full.entries.iter().filter(|(id, _)| sessions.contains_key(*id)).map(|(id, e)| (id.clone(), e.clone())).collect();
        repositories_snapshot.insert(repo.id.clone(), SessionStoreSnapshot { sessions, entries });
    }
    Snapshot {
        repositories: repositories_snapshot,
        session_runner_selections: lifecycle_state.runner_selections,
        codex_session_cache: HashMap::new(),
        child_to_parent_links: lifecycle_state.links,
        finalized_non_claude_sessions: Default::default(),
        stop_requested_sessions: lifecycle_state.stop_requested,
        issue_repository_cache: issue_repo_cache.lock().clone(),
        pending_selections: pending_selections.lock().clone(),
    }
}

fn entry_type_for(activity: &Activity) -> EntryType {
    match activity {
        Activity::Thought { .. } | Activity::Action { .. } | Activity::Elicitation { .. } => EntryType::Assistant,
        Activity::Response { .. } => EntryType::Result,
        Activity::Error { .. } => EntryType::System,
    }
}

fn entry_content_for(activity: &Activity) -> String {
    match activity {
        Activity::Thought { body } | Activity::Response { body } | Activity::Error { body } => body.clone(),
        Activity::Action { action, parameter, .. } => format!("{action}: {parameter}"),
        Activity::Elicitation { body, .. } => body.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cyrus_adapters::{FakeRunner, FakeTrackerService, Runner, TempDirWorkspaceProvider};
    use cyrus_core::{FakeClock, PromptedActivity};
    use std::time::Duration;

    #[derive(Clone)]
    struct SingleRunnerFactory {
        runner: Arc<FakeRunner>,
    }

    #[async_trait]
    impl RunnerFactory for SingleRunnerFactory {
        async fn create(&self, _selection: &RunnerSelection) -> Arc<dyn Runner> {
            self.runner.clone()
        }
    }

    type TestRuntime = Runtime<FakeTrackerService, SingleRunnerFactory, TempDirWorkspaceProvider, FakeClock>;

    fn repository(id: &str, routing_labels: Vec<&str>, team_keys: Vec<&str>) -> Repository {
        Repository {
            id: RepositoryId::new(id),
            display_name: id.to_string(),
            repo_path: "/tmp/repo".into(),
            base_branch: "main".into(),
            workspace_base_dir: "/tmp/ws".into(),
            tracker_workspace_id: "w1".into(),
            team_keys: team_keys.into_iter().map(String::from).collect(),
            project_keys: vec![],
            routing_labels: routing_labels.into_iter().map(String::from).collect(),
            github_url: None,
            role_configs: vec![],
            active: true,
        }
    }

    fn issue(id: &str, team_key: Option<&str>, labels: Vec<&str>) -> Issue {
        Issue {
            id: IssueId::new(id),
            identifier: format!("TEST-{id}"),
            title: "a title".into(),
            description: None,
            url: None,
            branch_name: None,
            labels: labels.into_iter().map(String::from).collect(),
            team_key: team_key.map(String::from),
            project_name: None,
        }
    }

    async fn bootstrap(repositories: Vec<Repository>) -> (TestRuntime, mpsc::UnboundedReceiver<RunnerOutcome>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path().join("state.json"));
        let tracker = FakeTrackerService::new();
        let factory = SingleRunnerFactory { runner: Arc::new(FakeRunner::new("native-1", true)) };
        let (runtime, outcomes_rx) =
            Runtime::bootstrap(repositories, tracker, factory, TempDirWorkspaceProvider, FakeClock::new(1_000), persistence)
                .await
                .unwrap();
        (runtime, outcomes_rx, dir)
    }

    async fn wait_for_posted(tracker: &FakeTrackerService, n: usize) {
        for _ in 0..50 {
            if tracker.posted().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn session_created_routes_and_acknowledges() {
        let (runtime, _outcomes_rx, _dir) = bootstrap(vec![repository("r1", vec!["backend"], vec![])]).await;
        let tracker = runtime.tracker.clone();

        runtime
            .handle_webhook(WebhookEvent::SessionCreated {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("s1"),
                issue_id: IssueId::new("i1"),
                issue_identifier: "TEST-1".into(),
                team_key: None,
                project_key: None,
                labels: Some(vec!["backend".into()]),
                guidance: None,
            })
            .await
            .unwrap();

        wait_for_posted(&tracker, 1).await;
        assert!(tracker.posted().iter().any(|p| p.session_id == AgentSessionId::new("s1")));
    }

    #[tokio::test]
    async fn session_created_with_tied_repositories_parks_elicitation() {
        let (runtime, _outcomes_rx, _dir) =
            bootstrap(vec![repository("r1", vec!["backend"], vec![]), repository("r2", vec!["backend"], vec![])]).await;
        let tracker = runtime.tracker.clone();

        runtime
            .handle_webhook(WebhookEvent::SessionCreated {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("s1"),
                issue_id: IssueId::new("i1"),
                issue_identifier: "TEST-1".into(),
                team_key: None,
                project_key: None,
                labels: Some(vec!["backend".into()]),
                guidance: None,
            })
            .await
            .unwrap();

        wait_for_posted(&tracker, 1).await;
        let posted = tracker.posted();
        assert!(matches!(posted.last().unwrap().post.activity, Activity::Elicitation { .. }));

        runtime.try_resolve_pending_selection(&AgentSessionId::new("s1"), "r2").await.unwrap();
        wait_for_posted(&tracker, 2).await;
    }

    #[tokio::test]
    async fn issue_unassigned_posts_nothing() {
        let (runtime, _outcomes_rx, _dir) = bootstrap(vec![repository("r1", vec!["backend"], vec![])]).await;
        let tracker = runtime.tracker.clone();

        runtime
            .handle_webhook(WebhookEvent::SessionCreated {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("s1"),
                issue_id: IssueId::new("i1"),
                issue_identifier: "TEST-1".into(),
                team_key: None,
                project_key: None,
                labels: Some(vec!["backend".into()]),
                guidance: None,
            })
            .await
            .unwrap();
        wait_for_posted(&tracker, 1).await;
        let before = tracker.posted().len();

        runtime.handle_webhook(WebhookEvent::IssueUnassigned { workspace_id: "w1".into(), issue_id: IssueId::new("i1") }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tracker.posted().len(), before);
    }

    #[tokio::test]
    async fn issue_assigned_continues_every_active_session_for_the_issue() {
        let (runtime, _outcomes_rx, _dir) = bootstrap(vec![repository("r1", vec!["backend"], vec![])]).await;
        let tracker = runtime.tracker.clone();

        runtime
            .handle_webhook(WebhookEvent::SessionCreated {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("s1"),
                issue_id: IssueId::new("i1"),
                issue_identifier: "TEST-1".into(),
                team_key: None,
                project_key: None,
                labels: Some(vec!["backend".into()]),
                guidance: None,
            })
            .await
            .unwrap();
        wait_for_posted(&tracker, 1).await;

        runtime
            .handle_webhook(WebhookEvent::IssueAssigned { workspace_id: "w1".into(), issue_id: IssueId::new("i1"), issue_identifier: "TEST-1".into() })
            .await
            .unwrap();
        wait_for_posted(&tracker, 2).await;
        assert!(tracker.posted().len() >= 2);
    }

    /// spec.md S6: a `session-prompted` arrives for a session the store has
    /// forgotten (e.g. lost across a restart before a snapshot caught it).
    /// Recovery refetches the issue, re-routes by team key, rebuilds the
    /// session under the original id, and posts a visible acknowledgement.
    #[tokio::test]
    async fn session_prompted_for_missing_session_recovers_via_team_routing() {
        let (runtime, _outcomes_rx, _dir) = bootstrap(vec![repository("r1", vec![], vec!["team-a"])]).await;
        let tracker = runtime.tracker.clone();
        tracker.seed_issue(issue("i1", Some("team-a"), vec![]));

        runtime
            .handle_webhook(WebhookEvent::SessionPrompted {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("s-lost"),
                issue_id: IssueId::new("i1"),
                activity: PromptedActivity { body: "still there?".into(), source_comment_id: None, signal: None },
            })
            .await
            .unwrap();

        wait_for_posted(&tracker, 1).await;
        let posted = tracker.posted();
        assert!(posted.iter().any(|p| p.session_id == AgentSessionId::new("s-lost")));
        assert!(matches!(posted.last().unwrap().post.activity, Activity::Response { .. }));
    }

    #[tokio::test]
    async fn session_prompted_for_missing_session_and_issue_posts_sanitized_error() {
        let (runtime, _outcomes_rx, _dir) = bootstrap(vec![repository("r1", vec![], vec!["team-a"])]).await;
        let tracker = runtime.tracker.clone();

        runtime
            .handle_webhook(WebhookEvent::SessionPrompted {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("s-lost"),
                issue_id: IssueId::new("ghost"),
                activity: PromptedActivity { body: "hello?".into(), source_comment_id: None, signal: None },
            })
            .await
            .unwrap();

        wait_for_posted(&tracker, 1).await;
        let posted = tracker.posted();
        assert!(matches!(posted.last().unwrap().post.activity, Activity::Error { .. }));
    }

    /// Supplemented feature: cleanup sweep only drops terminal sessions
    /// once they're older than the retention window, and leaves active
    /// ones alone.
    #[tokio::test]
    async fn run_cleanup_sweep_drops_only_stale_terminal_sessions() {
        let (runtime, _outcomes_rx, _dir) = bootstrap(vec![repository("r1", vec![], vec![])]).await;
        let tracker = runtime.tracker.clone();
        tracker.seed_issue(issue("i1", None, vec![]));
        tracker.seed_issue(issue("i2", None, vec![]));

        runtime
            .handle_webhook(WebhookEvent::SessionCreated {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("done"),
                issue_id: IssueId::new("i1"),
                issue_identifier: "TEST-1".into(),
                team_key: None,
                project_key: None,
                labels: None,
                guidance: None,
            })
            .await
            .unwrap();
        runtime
            .handle_webhook(WebhookEvent::SessionCreated {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("still-active"),
                issue_id: IssueId::new("i2"),
                issue_identifier: "TEST-2".into(),
                team_key: None,
                project_key: None,
                labels: None,
                guidance: None,
            })
            .await
            .unwrap();
        wait_for_posted(&tracker, 2).await;

        // `FakeRunner::start` never drives the translator on its own, so
        // complete `done` directly through the public outcome handler.
        runtime
            .handle_runner_outcome(RunnerOutcome { session_id: AgentSessionId::new("done"), subtype: Some("success".into()) })
            .await
            .unwrap();

        assert_eq!(runtime.store.get(&AgentSessionId::new("done")).unwrap().status, SessionStatus::Complete);

        let removed = runtime.run_cleanup_sweep(CLEANUP_RETENTION_MS).await.unwrap();
        assert!(removed.is_empty(), "not stale yet");

        runtime.clock.advance(CLEANUP_RETENTION_MS + 1);
        let removed = runtime.run_cleanup_sweep(CLEANUP_RETENTION_MS).await.unwrap();
        assert_eq!(removed, vec![AgentSessionId::new("done")]);
        assert!(runtime.store.get(&AgentSessionId::new("done")).is_none());
        assert!(runtime.store.get(&AgentSessionId::new("still-active")).is_some());
    }

    /// Supplemented feature: stall detection. A session whose runner has
    /// gone away without emitting a terminal event is transitioned to
    /// `Error` once its liveness timer fires.
    #[tokio::test]
    async fn liveness_timeout_on_a_dead_runner_transitions_to_error() {
        let (runtime, _outcomes_rx, _dir) = bootstrap(vec![repository("r1", vec![], vec![])]).await;
        let tracker = runtime.tracker.clone();
        tracker.seed_issue(issue("i1", None, vec![]));

        runtime
            .handle_webhook(WebhookEvent::SessionCreated {
                workspace_id: "w1".into(),
                agent_session_id: AgentSessionId::new("s1"),
                issue_id: IssueId::new("i1"),
                issue_identifier: "TEST-1".into(),
                team_key: None,
                project_key: None,
                labels: None,
                guidance: None,
            })
            .await
            .unwrap();
        wait_for_posted(&tracker, 1).await;

        runtime.supervisor.stop(&AgentSessionId::new("s1")).await.unwrap();

        let handle = spawn_liveness_timer(
            AgentSessionId::new("s1"),
            0,
            runtime.store.clone(),
            runtime.supervisor.clone(),
            runtime.lifecycle.clone(),
            runtime.effects_tx.clone(),
        );
        handle.await.unwrap();

        assert_eq!(runtime.store.get(&AgentSessionId::new("s1")).unwrap().status, SessionStatus::Error);
    }
}
