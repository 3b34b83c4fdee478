// SPDX-License-Identifier: MIT

//! Per-session runner configuration, chosen once at creation and reused
//! verbatim on restart/resume (§3 `RunnerSelection`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerType {
    Claude,
    Codex,
    Gemini,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    Mention,
    LabelBasedPromptCommand,
    LabelBased,
    Fallback,
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSelection {
    pub runner_type: RunnerType,
    pub model: Option<String>,
    pub resume_session_id: Option<String>,
    pub permissions: Vec<String>,
    pub prompt_type: PromptType,
}
