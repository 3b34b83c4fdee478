// SPDX-License-Identifier: MIT

//! Inbound event kinds from the webhook intake layer (§6). Dispatch
//! shape only — the HTTP listener and its payload parsing are out of
//! scope (§1 non-goals); this is the contract the dispatcher consumes.

use crate::issue::IssueId;
use crate::session::AgentSessionId;
use serde::{Deserialize, Serialize};

/// An activity attached to a `session-prompted` webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptedActivity {
    pub body: String,
    pub source_comment_id: Option<String>,
    /// `Some("stop")` triggers stop-propagation instead of a continuation.
    pub signal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WebhookEvent {
    SessionCreated {
        workspace_id: String,
        agent_session_id: AgentSessionId,
        issue_id: IssueId,
        issue_identifier: String,
        team_key: Option<String>,
        project_key: Option<String>,
        labels: Option<Vec<String>>,
        guidance: Option<String>,
    },
    SessionPrompted {
        workspace_id: String,
        agent_session_id: AgentSessionId,
        issue_id: IssueId,
        activity: PromptedActivity,
    },
    /// Equivalent to a `SessionPrompted` with a synthetic assignment body
    /// (§6: "Equivalent to a 'prompted' with synthetic body").
    IssueAssigned {
        workspace_id: String,
        issue_id: IssueId,
        issue_identifier: String,
    },
    /// Stops all active sessions for `issue_id` across every repository;
    /// no tracker feedback is posted.
    IssueUnassigned {
        workspace_id: String,
        issue_id: IssueId,
    },
    IssueStatusChanged {
        workspace_id: String,
        issue_id: IssueId,
        to_state: String,
    },
}

impl WebhookEvent {
    pub fn issue_id(&self) -> &IssueId {
        match self {
            WebhookEvent::SessionCreated { issue_id, .. }
            | WebhookEvent::SessionPrompted { issue_id, .. }
            | WebhookEvent::IssueAssigned { issue_id, .. }
            | WebhookEvent::IssueUnassigned { issue_id, .. }
            | WebhookEvent::IssueStatusChanged { issue_id, .. } => issue_id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            WebhookEvent::SessionCreated { .. } => "session-created",
            WebhookEvent::SessionPrompted { .. } => "session-prompted",
            WebhookEvent::IssueAssigned { .. } => "issue-assigned",
            WebhookEvent::IssueUnassigned { .. } => "issue-unassigned",
            WebhookEvent::IssueStatusChanged { .. } => "issue-status-changed",
        }
    }
}
