// SPDX-License-Identifier: MIT

//! The `WorkspaceProvider` collaborator (§6): allocates the on-disk
//! directory (often a git worktree) a runner executes in. Actual
//! filesystem/git mechanics beyond this thin adapter are out of scope
//! (§1 non-goals).

use async_trait::async_trait;
use cyrus_core::{Issue, Repository, Workspace};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace directory {path}: {source}")]
    CreateDir { path: String, #[source] source: std::io::Error },

    #[error("git worktree add failed with status {status}: {stderr}")]
    GitWorktree { status: i32, stderr: String },
}

#[async_trait]
pub trait WorkspaceProvider: Clone + Send + Sync + 'static {
    async fn create_workspace(&self, issue: &Issue, repository: &Repository) -> Result<Workspace, WorkspaceError>;
}

/// Creates a git worktree rooted at the repository's base branch, named
/// after the issue's human identifier.
#[derive(Clone, Default)]
pub struct GitWorktreeWorkspaceProvider;

#[async_trait]
impl WorkspaceProvider for GitWorktreeWorkspaceProvider {
    async fn create_workspace(&self, issue: &Issue, repository: &Repository) -> Result<Workspace, WorkspaceError> {
        let path = repository.workspace_base_dir.join(&issue.identifier);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| WorkspaceError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let output = Command::new("git")
            .arg("worktree")
            .arg("add")
            .arg(&path)
            .arg(&repository.base_branch)
            .current_dir(&repository.repo_path)
            .output()
            .await
            .map_err(|source| WorkspaceError::CreateDir { path: path.display().to_string(), source })?;

        if !output.status.success() {
            return Err(WorkspaceError::GitWorktree {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(Workspace { path, is_git_worktree: true })
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;

    /// Returns a plain temp directory without touching git, for tests
    /// that don't care about worktree mechanics.
    #[derive(Clone, Default)]
    pub struct TempDirWorkspaceProvider;

    #[async_trait]
    impl WorkspaceProvider for TempDirWorkspaceProvider {
        async fn create_workspace(
            &self,
            issue: &Issue,
            repository: &Repository,
        ) -> Result<Workspace, WorkspaceError> {
            let path = repository.workspace_base_dir.join(&issue.identifier);
            Ok(Workspace { path, is_git_worktree: false })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::TempDirWorkspaceProvider;

#[cfg(test)]
mod tests {
    use super::*;
    use cyrus_core::{IssueId, RepositoryId};
    use std::path::PathBuf;

    fn issue() -> Issue {
        Issue {
            id: IssueId::new("i1"),
            identifier: "TEST-1".into(),
            title: "t".into(),
            description: None,
            url: None,
            branch_name: None,
            labels: vec![],
            team_key: None,
            project_name: None,
        }
    }

    fn repository() -> Repository {
        Repository {
            id: RepositoryId::new("r1"),
            display_name: "repo".into(),
            repo_path: PathBuf::from("/tmp/repo"),
            base_branch: "main".into(),
            workspace_base_dir: PathBuf::from("/tmp/workspaces"),
            tracker_workspace_id: "w1".into(),
            team_keys: vec![],
            project_keys: vec![],
            routing_labels: vec![],
            github_url: None,
            role_configs: vec![],
            active: true,
        }
    }

    #[tokio::test]
    async fn temp_dir_provider_names_path_after_issue_identifier() {
        let provider = TempDirWorkspaceProvider;
        let ws = provider.create_workspace(&issue(), &repository()).await.unwrap();
        assert_eq!(ws.path, PathBuf::from("/tmp/workspaces/TEST-1"));
        assert!(!ws.is_git_worktree);
    }
}
