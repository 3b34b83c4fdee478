// SPDX-License-Identifier: MIT

//! Write-through JSON snapshotting (§4.7). The runtime calls
//! [`Persistence::save`] after every state-mutating operation; writes are
//! serialized through a single writer lock so two saves never race on
//! the same file, and restore happens once at startup, before any
//! webhook is accepted.

use crate::error::RuntimeError;
use crate::session_store::SessionStoreSnapshot;
use cyrus_core::{AgentSessionId, IssueRepositoryCache, ParentLinks, PendingSelection, RepositoryId, RunnerSelection};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex as AsyncMutex;

/// The exact persisted projection named in §4.7.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub repositories: HashMap<RepositoryId, SessionStoreSnapshot>,
    pub session_runner_selections: HashMap<AgentSessionId, RunnerSelection>,
    /// Codex's own session-resumption id, cached per session — Codex has
    /// no notion of a server-issued session id the way Claude does, so we
    /// remember its CLI-generated one ourselves.
    pub codex_session_cache: HashMap<AgentSessionId, String>,
    pub child_to_parent_links: ParentLinks,
    /// Sessions on a non-tracker platform whose terminal result has
    /// already been surfaced once (§4.5 platform gate: those sessions
    /// never get tracker activities, so dedup happens here instead).
    pub finalized_non_claude_sessions: HashSet<AgentSessionId>,
    pub stop_requested_sessions: HashSet<AgentSessionId>,
    pub issue_repository_cache: IssueRepositoryCache,
    pub pending_selections: HashMap<cyrus_core::PendingSelectionId, PendingSelection>,
}

pub struct Persistence {
    path: PathBuf,
    writer: AsyncMutex<()>,
}

impl Persistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: AsyncMutex::new(()) }
    }

    /// Atomic write: serialize to a sibling temp file, then rename over
    /// the real path, so a crash mid-write never leaves a truncated
    /// snapshot. The writer lock means concurrent `save` calls queue
    /// rather than interleave.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), RuntimeError> {
        let _guard = self.writer.lock().await;
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| RuntimeError::PersistenceError { message: e.to_string() })?;
        let tmp_path = tmp_path_for(&self.path);
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| RuntimeError::PersistenceError { message: e.to_string() })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| RuntimeError::PersistenceError { message: e.to_string() })?;
        Ok(())
    }

    /// Restores the last-saved snapshot, or an empty one if no snapshot
    /// file exists yet (first run).
    pub async fn restore(&self) -> Result<Snapshot, RuntimeError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| RuntimeError::PersistenceError { message: e.to_string() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(e) => Err(RuntimeError::PersistenceError { message: e.to_string() }),
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
