// SPDX-License-Identifier: MIT

//! Unresolved routing elicitations (§3 `PendingSelection`, §4.1 priority 7).

use crate::define_id;
use crate::repository::RepositoryId;
use crate::session::AgentSessionId;
use serde::{Deserialize, Serialize};

define_id! {
    /// Locally-generated id for a pending selection record.
    pub struct PendingSelectionId("psl-");
}

/// §9 Open Question, resolved: elicitations expire after this long if
/// never answered.
pub const DEFAULT_SELECTION_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSelection {
    pub id: PendingSelectionId,
    pub agent_session_id: AgentSessionId,
    pub candidates: Vec<RepositoryId>,
    pub created_at_ms: i64,
}

impl PendingSelection {
    pub fn is_expired(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) >= ttl_ms
    }
}
