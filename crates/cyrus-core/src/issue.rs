// SPDX-License-Identifier: MIT

//! Minimal issue projection carried on an [`crate::agent_session::AgentSession`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracker-assigned issue id (opaque to us, never generated locally).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct IssueId(pub String);

impl IssueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A minimal, denormalized snapshot of a tracker issue — just enough to
/// route events and assemble prompts. The orchestrator never owns the
/// full issue record; that lives with `IssueTrackerService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    /// Human-facing identifier, e.g. "TEST-123".
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub branch_name: Option<String>,
    /// Labels resolved to their display names.
    pub labels: Vec<String>,
    pub team_key: Option<String>,
    pub project_name: Option<String>,
}

impl Issue {
    /// The team-key prefix of the human identifier, e.g. "TEST" from
    /// "TEST-123". Used as a routing fallback when `team_key` is absent.
    pub fn identifier_prefix(&self) -> Option<&str> {
        self.identifier.split('-').next().filter(|s| !s.is_empty())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(identifier: &str) -> Issue {
        Issue {
            id: IssueId::new("iss-1"),
            identifier: identifier.to_string(),
            title: "t".into(),
            description: None,
            url: None,
            branch_name: None,
            labels: vec!["frontend".into()],
            team_key: None,
            project_name: None,
        }
    }

    #[test]
    fn identifier_prefix_splits_on_dash() {
        assert_eq!(issue("TEST-123").identifier_prefix(), Some("TEST"));
        assert_eq!(issue("NODASH").identifier_prefix(), Some("NODASH"));
    }

    #[test]
    fn has_label_is_case_insensitive() {
        assert!(issue("A-1").has_label("Frontend"));
        assert!(!issue("A-1").has_label("backend"));
    }
}
