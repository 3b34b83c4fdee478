// SPDX-License-Identifier: MIT

//! Repository selection for an inbound webhook (§4.1). A pure function
//! over the active repositories in a workspace, the issue being routed,
//! and whatever active-session/cache context the caller already knows —
//! it does not reach into `SessionStore` itself.

use cyrus_core::{Issue, IssueRepositoryCache, Repository, RepositoryId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Routed(RepositoryId),
    /// §4.1 priority 7 / invariant 5: either nothing matched, or more than
    /// one repository tied at the same priority. Either way the caller
    /// must elicit rather than guess.
    NeedsSelection { candidates: Vec<RepositoryId> },
    /// The workspace has no active repositories at all.
    NoRoutableRepository,
}

/// `active_sessions_for_issue` is the set of repositories that currently
/// have a non-terminal session for `issue.id` — computed by the caller
/// from `SessionStore` (§4.1 priority 1).
pub fn route(
    repositories: &[Repository],
    issue: &Issue,
    active_sessions_for_issue: &[RepositoryId],
    cache: &IssueRepositoryCache,
) -> RoutingDecision {
    let candidates: Vec<&Repository> = repositories.iter().filter(|r| r.active).collect();
    if candidates.is_empty() {
        return RoutingDecision::NoRoutableRepository;
    }

    // Cached hint is consulted first but is not itself a priority level:
    // it is only trusted when it still names a live candidate (§4.1: "the
    // cache is authoritative only as a hint").
    if let Some(cached) = cache.lookup(&issue.id) {
        if candidates.iter().any(|r| &r.id == cached) {
            return RoutingDecision::Routed(cached.clone());
        }
    }

    // Priority 1: active-session affinity.
    if !active_sessions_for_issue.is_empty() {
        return tie_or_pick(dedup(active_sessions_for_issue.to_vec()));
    }

    // Priority 2: label routing.
    let by_label: Vec<RepositoryId> = candidates
        .iter()
        .filter(|r| r.routing_labels.iter().any(|l| issue.has_label(l)))
        .map(|r| r.id.clone())
        .collect();
    if !by_label.is_empty() {
        return tie_or_pick(by_label);
    }

    // Priority 3: project routing.
    if let Some(project) = &issue.project_name {
        let by_project: Vec<RepositoryId> = candidates
            .iter()
            .filter(|r| r.project_keys.iter().any(|p| p == project))
            .map(|r| r.id.clone())
            .collect();
        if !by_project.is_empty() {
            return tie_or_pick(by_project);
        }
    }

    // Priority 4: team routing (team key, else identifier prefix).
    let team_key = issue.team_key.as_deref().or_else(|| issue.identifier_prefix());
    if let Some(team_key) = team_key {
        let by_team: Vec<RepositoryId> = candidates
            .iter()
            .filter(|r| r.team_keys.iter().any(|t| t == team_key))
            .map(|r| r.id.clone())
            .collect();
        if !by_team.is_empty() {
            return tie_or_pick(by_team);
        }
    }

    // Priority 5: catch-all (repositories with no routing constraints).
    let catch_all: Vec<RepositoryId> =
        candidates.iter().filter(|r| r.has_no_routing_constraints()).map(|r| r.id.clone()).collect();
    if !catch_all.is_empty() {
        return tie_or_pick(catch_all);
    }

    // Priority 6: single repo in the workspace.
    if candidates.len() == 1 {
        return RoutingDecision::Routed(candidates[0].id.clone());
    }

    // Priority 7: elicit among every active candidate.
    RoutingDecision::NeedsSelection { candidates: candidates.iter().map(|r| r.id.clone()).collect() }
}

fn dedup(mut ids: Vec<RepositoryId>) -> Vec<RepositoryId> {
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    ids.dedup();
    ids
}

fn tie_or_pick(candidates: Vec<RepositoryId>) -> RoutingDecision {
    if candidates.len() == 1 {
        RoutingDecision::Routed(candidates[0].clone())
    } else {
        RoutingDecision::NeedsSelection { candidates }
    }
}
