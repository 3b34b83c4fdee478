// SPDX-License-Identifier: MIT

//! In-memory session state (§4.2). Holds every `AgentSession` and its
//! transcript entries, independent of which repository they belong to —
//! repository scoping is just a field on `AgentSession`, so callers that
//! need "sessions for repository X" filter rather than index separately.
//!
//! `activeTaskByToolId` from §3 is not tracked here: it is scoped to a
//! single session's event-translation pass and lives inside
//! [`crate::event_translator::EventTranslator`] instead, which already
//! owns one instance per session. It is never persisted (§4.7's snapshot
//! projection does not list it either), so keeping it out of the store
//! costs nothing and avoids a second source of truth.

use cyrus_core::{AgentSession, AgentSessionId, IssueId, SessionEntry, SessionStatus};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<AgentSessionId, AgentSession>,
    entries: HashMap<AgentSessionId, Vec<SessionEntry>>,
}

/// Snapshot-friendly projection of the store, matching §4.7's persisted
/// shape (runner handles are never part of `AgentSession` itself, so no
/// extra stripping is needed here).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SessionStoreSnapshot {
    pub sessions: HashMap<AgentSessionId, AgentSession>,
    pub entries: HashMap<AgentSessionId, Vec<SessionEntry>>,
}

#[derive(Default)]
pub struct SessionStore {
    state: Mutex<State>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &AgentSessionId) -> Option<AgentSession> {
        self.state.lock().sessions.get(session_id).cloned()
    }

    /// Inserts a new session or overwrites an existing one in full.
    pub fn upsert(&self, session: AgentSession) {
        let mut state = self.state.lock();
        state.entries.entry(session.session_id.clone()).or_default();
        state.sessions.insert(session.session_id.clone(), session);
    }

    /// Applies `mutate` to the stored session if present, returning
    /// whether the session existed.
    pub fn update(&self, session_id: &AgentSessionId, mutate: impl FnOnce(&mut AgentSession)) -> bool {
        let mut state = self.state.lock();
        match state.sessions.get_mut(session_id) {
            Some(session) => {
                mutate(session);
                true
            }
            None => false,
        }
    }

    pub fn list_by_issue(&self, issue_id: &IssueId) -> Vec<AgentSession> {
        self.state.lock().sessions.values().filter(|s| &s.issue_id == issue_id).cloned().collect()
    }

    pub fn list_active_by_issue(&self, issue_id: &IssueId) -> Vec<AgentSession> {
        self.state
            .lock()
            .sessions
            .values()
            .filter(|s| &s.issue_id == issue_id && s.status == SessionStatus::Active)
            .cloned()
            .collect()
    }

    /// Invariant 3: an entry is only ever stored once it was successfully
    /// posted to the tracker. Returns `false` (and stores nothing) for an
    /// unposted entry or an unknown session.
    pub fn append_entry_if_posted(&self, session_id: &AgentSessionId, entry: SessionEntry) -> bool {
        if !entry.is_posted() {
            return false;
        }
        let mut state = self.state.lock();
        if !state.sessions.contains_key(session_id) {
            return false;
        }
        state.entries.entry(session_id.clone()).or_default().push(entry);
        true
    }

    pub fn entries(&self, session_id: &AgentSessionId) -> Vec<SessionEntry> {
        self.state.lock().entries.get(session_id).cloned().unwrap_or_default()
    }

    pub fn remove(&self, session_id: &AgentSessionId) {
        let mut state = self.state.lock();
        state.sessions.remove(session_id);
        state.entries.remove(session_id);
    }

    /// Drops terminal sessions last touched before `now_ms - older_than_ms`,
    /// returning the ids removed.
    pub fn cleanup(&self, now_ms: i64, older_than_ms: i64) -> Vec<AgentSessionId> {
        let mut state = self.state.lock();
        let stale: Vec<AgentSessionId> = state
            .sessions
            .values()
            .filter(|s| s.status.is_terminal() && now_ms.saturating_sub(s.updated_at_ms) >= older_than_ms)
            .map(|s| s.session_id.clone())
            .collect();
        for id in &stale {
            state.sessions.remove(id);
            state.entries.remove(id);
        }
        stale
    }

    pub fn snapshot(&self) -> SessionStoreSnapshot {
        let state = self.state.lock();
        SessionStoreSnapshot { sessions: state.sessions.clone(), entries: state.entries.clone() }
    }

    pub fn restore(snapshot: SessionStoreSnapshot) -> Self {
        Self { state: Mutex::new(State { sessions: snapshot.sessions, entries: snapshot.entries }) }
    }
}
