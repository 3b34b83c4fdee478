// SPDX-License-Identifier: MIT

//! Pure prompt assembly (§4.6). Produces the exact text sent to a runner
//! for a new session, a continuation, or a subroutine transition.

use cyrus_core::{PromptType, Repository};

#[derive(Debug, Clone, Default)]
pub struct ContinuationRequest {
    pub user_comment: String,
    pub attachment_manifest: Option<String>,
    pub is_subroutine_transition: bool,
    /// Epoch-ms timestamp used only when wrapping a subroutine directive;
    /// callers supply it so this module stays pure (no `Clock` dependency).
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewSessionRequest {
    pub issue_labels: Vec<String>,
    pub user_comment: Option<String>,
    pub is_mention_triggered: bool,
    pub is_label_based_prompt_requested: bool,
    pub subroutine_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMetadata {
    pub components: Vec<&'static str>,
    pub prompt_type: PromptType,
    pub is_new_session: bool,
    pub is_streaming: bool,
}

#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub metadata: PromptMetadata,
}

/// Continuation prompt, streamed into an already-running runner or
/// written fresh to stdin for a new process resuming a prior session.
pub fn assemble_continuation(request: &ContinuationRequest, is_streaming: bool) -> AssembledPrompt {
    let mut components = vec!["user-comment"];
    let mut user_prompt = request.user_comment.clone();
    if let Some(manifest) = &request.attachment_manifest {
        user_prompt.push_str("\n\n");
        user_prompt.push_str(manifest);
        components.push("attachment-manifest");
    }

    if request.is_subroutine_transition {
        user_prompt = format!(
            "<subroutine_directive priority=\"override\"><instruction>STOP your current work. This is a mandatory subroutine transition.</instruction><timestamp>{}</timestamp><content>{}</content></subroutine_directive>",
            request.timestamp_ms, user_prompt
        );
    } else {
        user_prompt = format!("<new_comment>{user_prompt}</new_comment>");
    }

    AssembledPrompt {
        system_prompt: None,
        user_prompt,
        metadata: PromptMetadata {
            components,
            prompt_type: PromptType::Continuation,
            is_new_session: false,
            is_streaming,
        },
    }
}

/// First-turn prompt for a freshly created session. `system_prompt_for_role`
/// resolves a role's configured prompt file contents — callers own I/O;
/// this function stays pure and takes the already-loaded text.
pub fn assemble_new_session(
    request: &NewSessionRequest,
    repository: &Repository,
    role_prompt_lookup: impl Fn(&str) -> Option<String>,
) -> AssembledPrompt {
    let matching_role = repository.matching_role(&request.issue_labels);
    let system_prompt = matching_role.and_then(|role| role_prompt_lookup(&role.role));

    let (issue_context_label, prompt_type): (&'static str, PromptType) = if request.is_mention_triggered {
        ("mention", PromptType::Mention)
    } else if request.is_label_based_prompt_requested {
        ("label-based-prompt-command", PromptType::LabelBasedPromptCommand)
    } else if system_prompt.is_some() {
        ("label-based", PromptType::LabelBased)
    } else {
        ("fallback", PromptType::Fallback)
    };

    let mut components = vec![issue_context_label];
    let mut blocks = vec![format!("<{issue_context_label}>")];

    if let Some(subroutine) = &request.subroutine_prompt {
        components.push("subroutine-prompt");
        blocks.push(subroutine.clone());
    }

    if let Some(comment) = &request.user_comment {
        components.push("user-comment");
        blocks.push(comment.clone());
    }

    AssembledPrompt {
        system_prompt,
        user_prompt: blocks.join("\n\n"),
        metadata: PromptMetadata { components, prompt_type, is_new_session: true, is_streaming: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyrus_core::RoleConfig;
    use std::path::PathBuf;

    fn repository_with_roles(roles: Vec<RoleConfig>) -> Repository {
        Repository {
            id: "r1".into(),
            display_name: "repo".into(),
            repo_path: PathBuf::from("/tmp/r"),
            base_branch: "main".into(),
            workspace_base_dir: PathBuf::from("/tmp/ws"),
            tracker_workspace_id: "w1".into(),
            team_keys: vec![],
            project_keys: vec![],
            routing_labels: vec![],
            github_url: None,
            role_configs: roles,
            active: true,
        }
    }

    #[test]
    fn continuation_wraps_in_new_comment_by_default() {
        let request = ContinuationRequest {
            user_comment: "do the thing".into(),
            attachment_manifest: None,
            is_subroutine_transition: false,
            timestamp_ms: 0,
        };
        let assembled = assemble_continuation(&request, true);
        assert!(assembled.system_prompt.is_none());
        assert_eq!(assembled.user_prompt, "<new_comment>do the thing</new_comment>");
        assert_eq!(assembled.metadata.prompt_type, PromptType::Continuation);
        assert!(assembled.metadata.is_streaming);
    }

    #[test]
    fn subroutine_transition_uses_override_directive() {
        let request = ContinuationRequest {
            user_comment: "switch tasks".into(),
            attachment_manifest: None,
            is_subroutine_transition: true,
            timestamp_ms: 1234,
        };
        let assembled = assemble_continuation(&request, false);
        assert!(assembled.user_prompt.starts_with("<subroutine_directive priority=\"override\">"));
        assert!(assembled.user_prompt.contains("mandatory subroutine transition"));
        assert!(assembled.user_prompt.contains("1234"));
    }

    #[test]
    fn new_session_picks_role_prompt_by_label_match() {
        let request = NewSessionRequest {
            issue_labels: vec!["bug".into()],
            user_comment: Some("please fix".into()),
            is_mention_triggered: false,
            is_label_based_prompt_requested: false,
            subroutine_prompt: None,
        };
        let repo = repository_with_roles(vec![RoleConfig {
            role: "debugger".into(),
            labels: vec!["bug".into()],
            allowed_tools: cyrus_core::AllowedTools::All,
            prompt_path: PathBuf::from("debugger.md"),
        }]);
        let assembled = assemble_new_session(&request, &repo, |role| {
            assert_eq!(role, "debugger");
            Some("You are the debugger.".into())
        });
        assert_eq!(assembled.system_prompt.as_deref(), Some("You are the debugger."));
        assert_eq!(assembled.metadata.prompt_type, PromptType::LabelBased);
        assert!(assembled.metadata.is_new_session);
    }

    #[test]
    fn new_session_falls_back_without_matching_role() {
        let request = NewSessionRequest {
            issue_labels: vec!["unrelated".into()],
            user_comment: None,
            is_mention_triggered: false,
            is_label_based_prompt_requested: false,
            subroutine_prompt: None,
        };
        let repo = repository_with_roles(vec![]);
        let assembled = assemble_new_session(&request, &repo, |_| None);
        assert_eq!(assembled.metadata.prompt_type, PromptType::Fallback);
        assert!(assembled.system_prompt.is_none());
    }
}
