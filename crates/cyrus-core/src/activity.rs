// SPDX-License-Identifier: MIT

//! Typed posts to the issue tracker (glossary: "Activity").

use serde::{Deserialize, Serialize};

/// An elicitation option — one selectable repository candidate (§4.1
/// priority 7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElicitationOption {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Activity {
    Thought {
        body: String,
    },
    Action {
        action: String,
        parameter: String,
        result: Option<String>,
    },
    Response {
        body: String,
    },
    Error {
        body: String,
    },
    /// §4.1 priority 7: `signal: "select"` carrying candidate options.
    Elicitation {
        body: String,
        options: Vec<ElicitationOption>,
    },
}

/// Wraps an [`Activity`] with posting options (§6 `createAgentActivity`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPost {
    pub activity: Activity,
    pub ephemeral: bool,
}

impl ActivityPost {
    pub fn new(activity: Activity) -> Self {
        Self { activity, ephemeral: false }
    }

    pub fn ephemeral(activity: Activity) -> Self {
        Self { activity, ephemeral: true }
    }
}
