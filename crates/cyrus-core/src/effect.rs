// SPDX-License-Identifier: MIT

//! The side effects a lifecycle decision can request. The executor (in
//! `cyrus-orchestrator`) is the only thing that turns these into adapter
//! calls; every other component only ever produces `Effect` values.
//!
//! Every variant carries a `name()` and `fields()` so the executor can log
//! one structured line per effect without bespoke formatting at each call
//! site.

use crate::activity::ActivityPost;
use crate::session::AgentSessionId;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PostActivity {
        session_id: AgentSessionId,
        post: ActivityPost,
    },
    /// Schedules the per-session liveness timer (see supplemented feature:
    /// stall detection). Re-arming replaces any existing timer.
    ArmLivenessTimer {
        session_id: AgentSessionId,
        after_ms: i64,
    },
    CancelLivenessTimer {
        session_id: AgentSessionId,
    },
    PersistSnapshot,
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::PostActivity { .. } => "post_activity",
            Effect::ArmLivenessTimer { .. } => "arm_liveness_timer",
            Effect::CancelLivenessTimer { .. } => "cancel_liveness_timer",
            Effect::PersistSnapshot => "persist_snapshot",
        }
    }

    /// Structured fields for a log line, in a stable, printable order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::PostActivity { session_id, post } => vec![
                ("session_id", session_id.to_string()),
                ("ephemeral", post.ephemeral.to_string()),
            ],
            Effect::ArmLivenessTimer { session_id, after_ms } => vec![
                ("session_id", session_id.to_string()),
                ("after_ms", after_ms.to_string()),
            ],
            Effect::CancelLivenessTimer { session_id } => vec![("session_id", session_id.to_string())],
            Effect::PersistSnapshot => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_variant() {
        let effect = Effect::CancelLivenessTimer { session_id: AgentSessionId::new("s1") };
        assert_eq!(effect.name(), "cancel_liveness_timer");
    }

    #[test]
    fn fields_carry_session_id_where_applicable() {
        let effect = Effect::ArmLivenessTimer { session_id: AgentSessionId::new("s1"), after_ms: 1_000 };
        let fields = effect.fields();
        assert!(fields.contains(&("session_id", "s1".to_string())));
        assert!(fields.contains(&("after_ms", "1000".to_string())));
    }

    #[test]
    fn persist_snapshot_has_no_fields() {
        assert!(Effect::PersistSnapshot.fields().is_empty());
    }
}
