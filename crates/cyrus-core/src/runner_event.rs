// SPDX-License-Identifier: MIT

//! The normalized runner stream event shape (§4.4, §9 "Dynamic message
//! union"). Claude/Codex/Gemini each speak a different native wire format;
//! the per-runner adapter (outside the orchestrator's scope) is
//! responsible for producing this sealed sum type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Compacting,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunnerEvent {
    /// First event of a run: reports the runner's own native session id.
    Session { runner_session_id: String },

    /// `system`/`init` event carrying the model name.
    SystemInit { model: Option<String> },

    /// Plain assistant text (no tool-use marker).
    AssistantText { text: String },

    /// Assistant requested a tool call.
    AssistantToolUse {
        tool_use_id: String,
        tool_name: String,
        parent_tool_use_id: Option<String>,
        input: serde_json::Value,
    },

    /// A tool result, keyed back to the tool-use id it answers.
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },

    /// Transcript compaction status change.
    Status {
        #[serde(rename = "status_kind")]
        kind: StatusKind,
    },

    /// A non-terminal error during execution (tool failure, etc).
    RuntimeError { message: String },

    /// The terminal result of the run.
    Final {
        /// e.g. `Some("success")`, `Some("error_max_turns")`, or `None`.
        subtype: Option<String>,
        result: Option<String>,
        error: Option<String>,
        /// Cumulative token/cost totals for the run, when the runner's
        /// wire format reports them (e.g. Claude Code's `result` message).
        #[serde(default)]
        usage: Option<UsageTotals>,
    },
}

/// Cumulative usage for a single run, mirrored into `SessionMetadata` on
/// the terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

impl RunnerEvent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RunnerEvent::Session { .. } => "session",
            RunnerEvent::SystemInit { .. } => "system_init",
            RunnerEvent::AssistantText { .. } => "assistant_text",
            RunnerEvent::AssistantToolUse { .. } => "assistant_tool_use",
            RunnerEvent::ToolResult { .. } => "tool_result",
            RunnerEvent::Status { .. } => "status",
            RunnerEvent::RuntimeError { .. } => "runtime_error",
            RunnerEvent::Final { .. } => "final",
        }
    }
}

/// The literal marker the final-assistant-text dedup protocol relies on
/// (glossary: "Final-message marker").
pub const LAST_MESSAGE_MARKER: &str = "___LAST_MESSAGE_MARKER___";

/// Strip every occurrence of the marker from a body before it is ever
/// posted to the tracker (§4.5: "The marker is always stripped from any
/// activity body actually posted").
pub fn strip_marker(s: &str) -> String {
    s.replace(LAST_MESSAGE_MARKER, "")
}
