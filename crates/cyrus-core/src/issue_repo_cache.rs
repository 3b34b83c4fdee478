// SPDX-License-Identifier: MIT

//! Sticky issue→repository routing affinity (§4.1 priority 1: "an issue
//! already bound to a live or recent session always re-routes to that
//! session's repository").

use crate::issue::IssueId;
use crate::repository::RepositoryId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueRepositoryCache {
    by_issue: HashMap<IssueId, RepositoryId>,
}

impl IssueRepositoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, issue_id: IssueId, repository_id: RepositoryId) {
        self.by_issue.insert(issue_id, repository_id);
    }

    pub fn lookup(&self, issue_id: &IssueId) -> Option<&RepositoryId> {
        self.by_issue.get(issue_id)
    }

    pub fn forget(&mut self, issue_id: &IssueId) {
        self.by_issue.remove(issue_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_then_lookup_round_trips() {
        let mut cache = IssueRepositoryCache::new();
        let issue = IssueId::new("iss-1");
        cache.remember(issue.clone(), RepositoryId::new("repo-1"));
        assert_eq!(cache.lookup(&issue), Some(&RepositoryId::new("repo-1")));
    }

    #[test]
    fn forget_clears_the_entry() {
        let mut cache = IssueRepositoryCache::new();
        let issue = IssueId::new("iss-1");
        cache.remember(issue.clone(), RepositoryId::new("repo-1"));
        cache.forget(&issue);
        assert_eq!(cache.lookup(&issue), None);
    }

    #[test]
    fn remember_overwrites_previous_binding() {
        let mut cache = IssueRepositoryCache::new();
        let issue = IssueId::new("iss-1");
        cache.remember(issue.clone(), RepositoryId::new("repo-1"));
        cache.remember(issue.clone(), RepositoryId::new("repo-2"));
        assert_eq!(cache.lookup(&issue), Some(&RepositoryId::new("repo-2")));
    }
}
