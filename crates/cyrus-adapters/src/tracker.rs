// SPDX-License-Identifier: MIT

//! The `IssueTrackerService` collaborator (§6): posts activities, fetches
//! issues and labels. The tracker's actual GraphQL schema is out of scope
//! (§1 non-goals); this is a thin REST-shaped client plus the trait
//! boundary everything else in the orchestrator depends on.

use async_trait::async_trait;
use cyrus_core::{ActivityPost, AgentSessionId, Issue, IssueId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("request to tracker failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("tracker returned status {status} for {operation}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[error("issue {0} not found")]
    IssueNotFound(IssueId),
}

#[async_trait]
pub trait IssueTrackerService: Clone + Send + Sync + 'static {
    /// Posts an activity to the session's issue thread and returns the
    /// tracker-assigned activity id (§8 invariant 3 depends on this id
    /// existing for anything stored as a `SessionEntry`).
    async fn create_agent_activity(
        &self,
        session_id: &AgentSessionId,
        post: &ActivityPost,
    ) -> Result<String, TrackerError>;

    async fn fetch_issue(&self, id: &IssueId) -> Result<Issue, TrackerError>;

    async fn fetch_labels(&self, workspace_id: &str) -> Result<Vec<String>, TrackerError>;
}

/// Minimal `reqwest`-based client against a REST-shaped facade over the
/// tracker. Wire payload shapes are placeholders for the real GraphQL API,
/// which is explicitly out of scope.
#[derive(Clone)]
pub struct HttpTrackerService {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpTrackerService {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_token: api_token.into() }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_token)
    }
}

#[async_trait]
impl IssueTrackerService for HttpTrackerService {
    async fn create_agent_activity(
        &self,
        session_id: &AgentSessionId,
        post: &ActivityPost,
    ) -> Result<String, TrackerError> {
        let url = format!("{}/agent-sessions/{}/activities", self.base_url, session_id);
        let response = self.authed(self.client.post(&url)).json(post).send().await?;
        if !response.status().is_success() {
            return Err(TrackerError::UnexpectedStatus {
                operation: "create_agent_activity",
                status: response.status().as_u16(),
            });
        }
        let body: serde_json::Value = response.json().await?;
        Ok(body["id"].as_str().unwrap_or_default().to_string())
    }

    async fn fetch_issue(&self, id: &IssueId) -> Result<Issue, TrackerError> {
        let url = format!("{}/issues/{}", self.base_url, id);
        let response = self.authed(self.client.get(&url)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TrackerError::IssueNotFound(id.clone()));
        }
        if !response.status().is_success() {
            return Err(TrackerError::UnexpectedStatus {
                operation: "fetch_issue",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch_labels(&self, workspace_id: &str) -> Result<Vec<String>, TrackerError> {
        let url = format!("{}/workspaces/{}/labels", self.base_url, workspace_id);
        let response = self.authed(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(TrackerError::UnexpectedStatus {
                operation: "fetch_labels",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub struct PostedActivity {
        pub session_id: AgentSessionId,
        pub post: ActivityPost,
    }

    struct FakeState {
        posted: Vec<PostedActivity>,
        issues: HashMap<IssueId, Issue>,
        labels: HashMap<String, Vec<String>>,
        next_activity_id: u64,
    }

    /// In-memory tracker double for orchestrator tests.
    #[derive(Clone)]
    pub struct FakeTrackerService {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeTrackerService {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    posted: Vec::new(),
                    issues: HashMap::new(),
                    labels: HashMap::new(),
                    next_activity_id: 1,
                })),
            }
        }
    }

    impl FakeTrackerService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_issue(&self, issue: Issue) {
            self.inner.lock().issues.insert(issue.id.clone(), issue);
        }

        pub fn seed_labels(&self, workspace_id: impl Into<String>, labels: Vec<String>) {
            self.inner.lock().labels.insert(workspace_id.into(), labels);
        }

        pub fn posted(&self) -> Vec<PostedActivity> {
            self.inner.lock().posted.clone()
        }
    }

    #[async_trait]
    impl IssueTrackerService for FakeTrackerService {
        async fn create_agent_activity(
            &self,
            session_id: &AgentSessionId,
            post: &ActivityPost,
        ) -> Result<String, TrackerError> {
            let mut state = self.inner.lock();
            let id = format!("act-{}", state.next_activity_id);
            state.next_activity_id += 1;
            state.posted.push(PostedActivity { session_id: session_id.clone(), post: post.clone() });
            Ok(id)
        }

        async fn fetch_issue(&self, id: &IssueId) -> Result<Issue, TrackerError> {
            self.inner.lock().issues.get(id).cloned().ok_or_else(|| TrackerError::IssueNotFound(id.clone()))
        }

        async fn fetch_labels(&self, workspace_id: &str) -> Result<Vec<String>, TrackerError> {
            Ok(self.inner.lock().labels.get(workspace_id).cloned().unwrap_or_default())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTrackerService, PostedActivity};

#[cfg(test)]
mod tests {
    use super::*;
    use cyrus_core::Activity;

    #[tokio::test]
    async fn fake_tracker_records_posted_activities() {
        let tracker = FakeTrackerService::new();
        let post = ActivityPost::new(Activity::Response { body: "hi".into() });
        let id = tracker.create_agent_activity(&AgentSessionId::new("s1"), &post).await.unwrap();
        assert_eq!(id, "act-1");
        assert_eq!(tracker.posted().len(), 1);
    }

    #[tokio::test]
    async fn fake_tracker_seeded_issue_is_fetchable() {
        let tracker = FakeTrackerService::new();
        let issue = Issue {
            id: IssueId::new("i1"),
            identifier: "TEST-1".into(),
            title: "t".into(),
            description: None,
            url: None,
            branch_name: None,
            labels: vec![],
            team_key: None,
            project_name: None,
        };
        tracker.seed_issue(issue.clone());
        let fetched = tracker.fetch_issue(&IssueId::new("i1")).await.unwrap();
        assert_eq!(fetched, issue);
    }

    #[tokio::test]
    async fn fetch_issue_missing_returns_not_found() {
        let tracker = FakeTrackerService::new();
        let err = tracker.fetch_issue(&IssueId::new("missing")).await.unwrap_err();
        assert!(matches!(err, TrackerError::IssueNotFound(_)));
    }
}
