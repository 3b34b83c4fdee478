// SPDX-License-Identifier: MIT

//! Repository configuration — immutable at runtime (§3).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RepositoryId(pub String);

impl RepositoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RepositoryId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Which tools a role is permitted to invoke. §9: "Dynamic config objects
/// ... enumerated set of options". Deserializes from either the short
/// keyword form or an explicit allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AllowedTools {
    All,
    Safe,
    ReadOnly,
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for AllowedTools {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Keyword(String),
            List(Vec<String>),
        }
        match Helper::deserialize(deserializer)? {
            Helper::List(tools) => Ok(AllowedTools::List(tools)),
            Helper::Keyword(s) => match s.as_str() {
                "all" => Ok(AllowedTools::All),
                "safe" => Ok(AllowedTools::Safe),
                "readOnly" | "read_only" => Ok(AllowedTools::ReadOnly),
                other => Err(serde::de::Error::custom(format!(
                    "unknown allowedTools keyword: {other:?} (expected \"all\", \"safe\", \"readOnly\", or a list)"
                ))),
            },
        }
    }
}

/// A named role a session can run under (e.g. "debugger", "builder").
///
/// Config order is preserved by `Repository::role_configs`; it is the
/// tie-breaker when two roles have no relative precedence (§9 Open
/// Question).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub role: String,
    pub labels: Vec<String>,
    pub allowed_tools: AllowedTools,
    pub prompt_path: PathBuf,
}

/// Precedence among the four well-known roles named in §4.6: when an
/// issue's labels match more than one role, the highest-precedence match
/// wins. Roles outside this set fall back to config order (handled by the
/// caller, since this function only orders the known four).
pub fn well_known_role_rank(role: &str) -> Option<u8> {
    match role {
        "debugger" => Some(0),
        "builder" => Some(1),
        "scoper" => Some(2),
        "orchestrator" => Some(3),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Repository {
    pub id: RepositoryId,
    pub display_name: String,
    pub repo_path: PathBuf,
    pub base_branch: String,
    pub workspace_base_dir: PathBuf,
    pub tracker_workspace_id: String,
    #[serde(default)]
    pub team_keys: Vec<String>,
    #[serde(default)]
    pub project_keys: Vec<String>,
    #[serde(default)]
    pub routing_labels: Vec<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    /// Ordered as declared in config; order is the role tie-breaker.
    #[serde(default)]
    pub role_configs: Vec<RoleConfig>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Repository {
    /// Whether this repository has no routing constraints configured at
    /// all — the §4.1 priority-5 "catch-all" candidate.
    pub fn has_no_routing_constraints(&self) -> bool {
        self.team_keys.is_empty() && self.project_keys.is_empty() && self.routing_labels.is_empty()
    }

    /// Display label used in elicitation prompts (§4.1 priority 7):
    /// GitHub URL when available, else display name.
    pub fn elicitation_label(&self) -> &str {
        self.github_url.as_deref().unwrap_or(&self.display_name)
    }

    /// First role (in config order) whose label list intersects the
    /// issue's labels, preferring well-known-role precedence among ties,
    /// per §4.6.
    pub fn matching_role<'a>(&'a self, issue_labels: &[String]) -> Option<&'a RoleConfig> {
        let mut candidates: Vec<&RoleConfig> = self
            .role_configs
            .iter()
            .filter(|rc| {
                rc.labels
                    .iter()
                    .any(|l| issue_labels.iter().any(|il| il.eq_ignore_ascii_case(l)))
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        // Stable sort: well-known roles by rank, unknown roles keep
        // relative (config) order, placed after all well-known ones.
        candidates.sort_by_key(|rc| well_known_role_rank(&rc.role).unwrap_or(u8::MAX));
        candidates.into_iter().next()
    }
}
