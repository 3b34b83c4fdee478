// SPDX-License-Identifier: MIT

//! The parent↔child session forest (§3 `ParentLink`, §9: "store as two
//! maps ... rebuilt from one source of truth on restore; never model as
//! bidirectional pointers").
//!
//! `child_to_parent` is the single source of truth (and what gets
//! persisted, §4.7); `parent_to_children` is a derived index rebuilt
//! on `rebuild_index`/`restore`. Cycles are structurally impossible: a
//! child's id is only ever inserted once, by the parent that delegated to
//! it, and a session can't be its own ancestor because ids are freshly
//! minted by the tracker for every new session.

use crate::session::AgentSessionId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentLinks {
    child_to_parent: HashMap<AgentSessionId, AgentSessionId>,
    #[serde(skip)]
    parent_to_children: HashMap<AgentSessionId, HashSet<AgentSessionId>>,
}

impl ParentLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&mut self, child: AgentSessionId, parent: AgentSessionId) {
        self.parent_to_children.entry(parent.clone()).or_default().insert(child.clone());
        self.child_to_parent.insert(child, parent);
    }

    pub fn parent_of(&self, child: &AgentSessionId) -> Option<&AgentSessionId> {
        self.child_to_parent.get(child)
    }

    pub fn children_of(&self, parent: &AgentSessionId) -> Vec<AgentSessionId> {
        self.parent_to_children.get(parent).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// BFS over the subtree rooted at (and including) `root` (§4.3 stop
    /// propagation, §8 invariant 6).
    pub fn descendants_including_self(&self, root: &AgentSessionId) -> Vec<AgentSessionId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(root.clone());
        seen.insert(root.clone());
        while let Some(node) = queue.pop_front() {
            out.push(node.clone());
            for child in self.children_of(&node) {
                if seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Invariant 4: discard orphaned child links whose child no longer
    /// exists in the same repository's session set.
    pub fn retain_existing(&mut self, exists: impl Fn(&AgentSessionId) -> bool) {
        let dropped: Vec<AgentSessionId> =
            self.child_to_parent.keys().filter(|c| !exists(c)).cloned().collect();
        for child in dropped {
            self.child_to_parent.remove(&child);
        }
        self.rebuild_index();
    }

    /// Rebuild the derived `parent_to_children` index from
    /// `child_to_parent`, the only thing persisted (§4.7).
    pub fn rebuild_index(&mut self) {
        self.parent_to_children.clear();
        for (child, parent) in &self.child_to_parent {
            self.parent_to_children.entry(parent.clone()).or_default().insert(child.clone());
        }
    }
}
