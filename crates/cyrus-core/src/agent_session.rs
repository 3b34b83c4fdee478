// SPDX-License-Identifier: MIT

//! The authoritative session record (§3).

use crate::issue::Issue;
use crate::repository::RepositoryId;
use crate::session::{AgentSessionId, RunnerSessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Complete,
    Error,
    Stopped,
}

impl SessionStatus {
    /// Invariant 6: final statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Error | SessionStatus::Stopped)
    }
}

/// Controls whether the `EventTranslator` posts activities at all (§4.5
/// "Platform gate").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Tracker,
    Github,
    Cli,
}

impl Platform {
    pub fn posts_activities(self) -> bool {
        matches!(self, Platform::Tracker)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub model: Option<String>,
    pub tools: Vec<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// On-disk/in-process workspace handle for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub path: std::path::PathBuf,
    pub is_git_worktree: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSession {
    pub session_id: AgentSessionId,
    pub repository_id: RepositoryId,
    pub issue_id: crate::issue::IssueId,
    pub issue: Issue,
    pub workspace: Workspace,
    pub status: SessionStatus,
    pub platform: Platform,
    pub runner_session_id: Option<RunnerSessionId>,
    pub metadata: SessionMetadata,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl AgentSession {
    pub fn new(
        session_id: AgentSessionId,
        repository_id: RepositoryId,
        issue: Issue,
        workspace: Workspace,
        platform: Platform,
        now_ms: i64,
    ) -> Self {
        Self {
            issue_id: issue.id.clone(),
            session_id,
            repository_id,
            issue,
            workspace,
            status: SessionStatus::Active,
            platform,
            runner_session_id: None,
            metadata: SessionMetadata::default(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Invariant 6: attempting to transition a terminal session is a no-op
    /// that the caller should treat as "already settled", not an error.
    pub fn transition_to(&mut self, status: SessionStatus, now_ms: i64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.updated_at_ms = now_ms;
        true
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at_ms = now_ms;
    }
}
