// SPDX-License-Identifier: MIT

//! Pure mapping from a session's runner event stream to tracker activities
//! (§4.5). One `EventTranslator` is scoped to exactly one session; its
//! state (active Task, pending tool actions, stashed final text) only
//! makes sense within that session's event order.

use crate::tool_format::{format_tool_call, format_tool_result};
use cyrus_core::{Activity, ActivityPost};
use cyrus_core::{RunnerEvent, StatusKind, LAST_MESSAGE_MARKER};
use std::collections::HashMap;

struct PendingAction {
    tool_name: String,
    input: serde_json::Value,
    under_active_task: bool,
}

#[derive(Default)]
pub struct EventTranslator {
    model_announced: bool,
    active_task_tool_use_id: Option<String>,
    pending_actions: HashMap<String, PendingAction>,
    /// The last assistant text seen carrying the final-message marker,
    /// stripped. Used as a fallback `response` body if the terminal
    /// result arrives without one (§4.5 dedup protocol).
    stashed_final_text: Option<String>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates one runner event into zero or more activity posts.
    /// Callers must apply the §4.5 platform gate themselves before
    /// invoking this — a non-`tracker` session should never call it.
    pub fn translate(&mut self, event: &RunnerEvent) -> Vec<ActivityPost> {
        match event {
            RunnerEvent::Session { .. } => vec![],

            RunnerEvent::SystemInit { model } => {
                if self.model_announced {
                    return vec![];
                }
                self.model_announced = true;
                match model {
                    Some(name) => vec![ActivityPost::new(Activity::Thought {
                        body: format!("Using model: {name}"),
                    })],
                    None => vec![],
                }
            }

            RunnerEvent::AssistantText { text } => {
                if text.contains(LAST_MESSAGE_MARKER) {
                    self.stashed_final_text = Some(text.replace(LAST_MESSAGE_MARKER, ""));
                    vec![]
                } else {
                    vec![ActivityPost::new(Activity::Thought { body: text.clone() })]
                }
            }

            RunnerEvent::AssistantToolUse { tool_use_id, tool_name, parent_tool_use_id, input } => {
                self.handle_tool_use(tool_use_id, tool_name, parent_tool_use_id.as_deref(), input)
            }

            RunnerEvent::ToolResult { tool_use_id, content, .. } => self.handle_tool_result(tool_use_id, content),

            RunnerEvent::Status { kind } => match kind {
                StatusKind::Compacting => vec![ActivityPost::ephemeral(Activity::Thought {
                    body: "Compacting conversation history…".to_string(),
                })],
                StatusKind::Cleared => vec![ActivityPost::new(Activity::Thought {
                    body: "Conversation history compacted".to_string(),
                })],
            },

            RunnerEvent::RuntimeError { message } => {
                vec![ActivityPost::new(Activity::Thought { body: format!("❌ {message}") })]
            }

            RunnerEvent::Final { subtype, result, error, .. } => self.handle_final(subtype.as_deref(), result.as_deref(), error.as_deref()),
        }
    }

    fn handle_tool_use(
        &mut self,
        tool_use_id: &str,
        tool_name: &str,
        parent_tool_use_id: Option<&str>,
        input: &serde_json::Value,
    ) -> Vec<ActivityPost> {
        if tool_name == "TodoWrite" {
            return vec![ActivityPost::new(Activity::Thought { body: render_todo_checklist(input) })];
        }

        if tool_name == "Task" {
            self.active_task_tool_use_id = Some(tool_use_id.to_string());
            let parameter = render_task_input(input);
            return vec![ActivityPost::new(Activity::Action {
                action: "Task".to_string(),
                parameter,
                result: None,
            })];
        }

        let under_active_task = matches!(
            (parent_tool_use_id, &self.active_task_tool_use_id),
            (Some(parent), Some(active)) if parent == active
        );
        self.pending_actions.insert(
            tool_use_id.to_string(),
            PendingAction { tool_name: tool_name.to_string(), input: input.clone(), under_active_task },
        );
        vec![]
    }

    fn handle_tool_result(&mut self, tool_use_id: &str, content: &str) -> Vec<ActivityPost> {
        if self.active_task_tool_use_id.as_deref() == Some(tool_use_id) {
            self.active_task_tool_use_id = None;
            return vec![ActivityPost::new(Activity::Thought {
                body: format!("✅ Task Completed\n\n\n\n{content}\n\n---\n\n"),
            })];
        }

        let Some(pending) = self.pending_actions.remove(tool_use_id) else {
            return vec![];
        };

        let (label, parameter) = format_tool_call(&pending.tool_name, &pending.input);
        let action = if pending.under_active_task { format!("↪ {label}") } else { label };
        let file_path = pending.input.get("file_path").and_then(serde_json::Value::as_str);
        let result = format_tool_result(&pending.tool_name, file_path, content);

        vec![ActivityPost::new(Activity::Action { action, parameter, result: Some(result) })]
    }

    fn handle_final(&mut self, subtype: Option<&str>, result: Option<&str>, error: Option<&str>) -> Vec<ActivityPost> {
        match subtype {
            Some("success") => {
                let body = result
                    .map(|r| r.replace(LAST_MESSAGE_MARKER, ""))
                    .filter(|s| !s.is_empty())
                    .or_else(|| self.stashed_final_text.take())
                    .unwrap_or_default();
                vec![ActivityPost::new(Activity::Response { body })]
            }
            _ => {
                let body = error.or(result).unwrap_or("Reached max turns").to_string();
                vec![ActivityPost::new(Activity::Error { body })]
            }
        }
    }
}

fn render_todo_checklist(input: &serde_json::Value) -> String {
    let Some(todos) = input.get("todos").and_then(serde_json::Value::as_array) else {
        return String::new();
    };
    todos
        .iter()
        .map(|todo| {
            let content = todo.get("content").and_then(serde_json::Value::as_str).unwrap_or("");
            let status = todo.get("status").and_then(serde_json::Value::as_str).unwrap_or("pending");
            let marker = match status {
                "completed" => "✅",
                "in_progress" => "🔄",
                _ => "⏳",
            };
            format!("{marker} {content}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_task_input(input: &serde_json::Value) -> String {
    input
        .get("description")
        .or_else(|| input.get("prompt"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activities(translator: &mut EventTranslator, events: &[RunnerEvent]) -> Vec<ActivityPost> {
        events.iter().flat_map(|e| translator.translate(e)).collect()
    }

    /// S1 — final-message dedup.
    #[test]
    fn final_message_marker_produces_exactly_one_response() {
        let mut translator = EventTranslator::new();
        let events = vec![
            RunnerEvent::AssistantText {
                text: format!("{LAST_MESSAGE_MARKER}Summary: fixed bug"),
            },
            RunnerEvent::Final {
                subtype: Some("success".to_string()),
                result: Some(format!("{LAST_MESSAGE_MARKER}Summary: fixed bug")),
                error: None,
                usage: None,
            },
        ];
        let posts = activities(&mut translator, &events);
        assert_eq!(posts.len(), 1);
        match &posts[0].activity {
            Activity::Response { body } => assert_eq!(body, "Summary: fixed bug"),
            other => panic!("expected Response, got {other:?}"),
        }
        assert!(!posts.iter().any(|p| matches!(&p.activity, Activity::Thought { body } if body.contains(LAST_MESSAGE_MARKER))));
    }

    #[test]
    fn final_message_marker_falls_back_to_stashed_text_when_result_empty() {
        let mut translator = EventTranslator::new();
        let events = vec![
            RunnerEvent::AssistantText { text: format!("{LAST_MESSAGE_MARKER}done") },
            RunnerEvent::Final { subtype: Some("success".to_string()), result: None, error: None, usage: None },
        ];
        let posts = activities(&mut translator, &events);
        assert_eq!(posts.len(), 1);
        match &posts[0].activity {
            Activity::Response { body } => assert_eq!(body, "done"),
            other => panic!("expected Response, got {other:?}"),
        }
    }

    /// S2 — tool grouping.
    #[test]
    fn nested_tool_call_groups_under_active_task() {
        let mut translator = EventTranslator::new();
        let events = vec![
            RunnerEvent::AssistantToolUse {
                tool_use_id: "t1".into(),
                tool_name: "Task".into(),
                parent_tool_use_id: None,
                input: json!({"description": "do X"}),
            },
            RunnerEvent::AssistantToolUse {
                tool_use_id: "t2".into(),
                tool_name: "Bash".into(),
                parent_tool_use_id: Some("t1".into()),
                input: json!({"command": "ls", "description": "list"}),
            },
            RunnerEvent::ToolResult { tool_use_id: "t2".into(), content: "a\nb".into(), is_error: false },
            RunnerEvent::ToolResult { tool_use_id: "t1".into(), content: "done".into(), is_error: false },
        ];
        let posts = activities(&mut translator, &events);
        assert_eq!(posts.len(), 3);

        match &posts[0].activity {
            Activity::Action { action, parameter, result } => {
                assert_eq!(action, "Task");
                assert_eq!(parameter, "do X");
                assert_eq!(*result, None);
            }
            other => panic!("expected Action, got {other:?}"),
        }

        match &posts[1].activity {
            Activity::Action { action, parameter, result } => {
                assert_eq!(action, "↪ Bash (list)");
                assert_eq!(parameter, "ls");
                assert_eq!(result.as_deref(), Some("```\na\nb\n```"));
            }
            other => panic!("expected Action, got {other:?}"),
        }

        match &posts[2].activity {
            Activity::Thought { body } => assert_eq!(body, "✅ Task Completed\n\n\n\ndone\n\n---\n\n"),
            other => panic!("expected Thought, got {other:?}"),
        }
    }

    /// S7 — terminal error.
    #[test]
    fn error_max_turns_produces_error_activity() {
        let mut translator = EventTranslator::new();
        let posts = translator.translate(&RunnerEvent::Final {
            subtype: Some("error_max_turns".to_string()),
            result: None,
            error: Some("Reached max turns".to_string()),
            usage: None,
        });
        assert_eq!(posts.len(), 1);
        match &posts[0].activity {
            Activity::Error { body } => assert!(body.contains("max")),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn model_name_is_announced_only_once() {
        let mut translator = EventTranslator::new();
        let first = translator.translate(&RunnerEvent::SystemInit { model: Some("claude-4".into()) });
        let second = translator.translate(&RunnerEvent::SystemInit { model: Some("claude-4".into()) });
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn compacting_status_is_ephemeral_cleared_is_not() {
        let mut translator = EventTranslator::new();
        let compacting = translator.translate(&RunnerEvent::Status { kind: StatusKind::Compacting });
        let cleared = translator.translate(&RunnerEvent::Status { kind: StatusKind::Cleared });
        assert!(compacting[0].ephemeral);
        assert!(!cleared[0].ephemeral);
    }

    #[test]
    fn todo_write_renders_status_markers() {
        let mut translator = EventTranslator::new();
        let posts = translator.translate(&RunnerEvent::AssistantToolUse {
            tool_use_id: "t1".into(),
            tool_name: "TodoWrite".into(),
            parent_tool_use_id: None,
            input: json!({"todos": [{"content": "write tests", "status": "completed"}, {"content": "ship", "status": "pending"}]}),
        });
        match &posts[0].activity {
            Activity::Thought { body } => {
                assert!(body.contains("✅ write tests"));
                assert!(body.contains("⏳ ship"));
            }
            other => panic!("expected Thought, got {other:?}"),
        }
    }
}
