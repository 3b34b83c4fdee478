// SPDX-License-Identifier: MIT

//! Append-only transcript rows (§3 `SessionEntry`).
//!
//! Invariant 3: an entry only exists in the store if it was successfully
//! posted to the tracker, i.e. `tracker_activity_id` is always `Some` for
//! a stored entry. We still model it as `Option` on the struct because the
//! same struct is built before the post succeeds/fails (§4.5, §7
//! `TrackerPostError`); callers must not insert it into the store unless
//! the id got filled in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    User,
    Assistant,
    System,
    Result,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub timestamp_ms: i64,
    pub tool_use_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<serde_json::Value>,
    pub parent_tool_use_id: Option<String>,
    pub is_error: bool,
    pub is_terminal_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub entry_type: EntryType,
    pub content: String,
    pub metadata: EntryMetadata,
    /// Present iff the entry was successfully posted (invariant 3).
    pub tracker_activity_id: Option<String>,
}

impl SessionEntry {
    pub fn is_posted(&self) -> bool {
        self.tracker_activity_id.is_some()
    }
}
