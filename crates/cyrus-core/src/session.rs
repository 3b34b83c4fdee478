// SPDX-License-Identifier: MIT

//! Identifiers assigned by the issue tracker, not generated locally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The tracker-assigned UUID that primary-keys an [`crate::agent_session::AgentSession`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct AgentSessionId(pub String);

impl AgentSessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentSessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AgentSessionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for AgentSessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// The id the runner subprocess reports for its own native session on its
/// first emitted event. `None` until that event arrives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunnerSessionId(pub String);

impl RunnerSessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunnerSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunnerSessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
