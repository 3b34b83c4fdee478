// SPDX-License-Identifier: MIT

//! Loads and validates `repositories.toml`, the per-daemon configuration
//! naming every repository Cyrus may route issues to (§9 "Dynamic config
//! objects").
//!
//! Unknown keys are rejected at the `cyrus_core::Repository` /
//! `cyrus_core::RoleConfig` deserialization boundary (`deny_unknown_fields`);
//! this crate adds the cross-field validation `serde` can't express on its
//! own — duplicate ids, duplicate roles, and roles with empty label lists.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;

pub use error::ConfigError;

use cyrus_core::Repository;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepositoriesFile {
    #[serde(rename = "repository", default)]
    repositories: Vec<Repository>,
}

/// Parse `repositories.toml` from disk and validate it. Mirrors the
/// teacher's runbook-loading shape: parse into a raw tree, then walk it
/// once for semantic checks `serde` itself can't express.
pub fn load_repositories(path: &Path) -> Result<Vec<Repository>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_repositories(&contents, &path.display().to_string())
}

pub fn parse_repositories(toml_source: &str, source_name: &str) -> Result<Vec<Repository>, ConfigError> {
    let file: RepositoriesFile = toml::from_str(toml_source).map_err(|source| ConfigError::Parse {
        path: source_name.to_string(),
        source,
    })?;
    validate(&file.repositories)?;
    Ok(file.repositories)
}

fn validate(repositories: &[Repository]) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();
    for repo in repositories {
        if !seen_ids.insert(repo.id.as_str()) {
            return Err(ConfigError::DuplicateRepositoryId { id: repo.id.to_string() });
        }

        let mut seen_roles = HashSet::new();
        for role in &repo.role_configs {
            if !seen_roles.insert(role.role.as_str()) {
                return Err(ConfigError::DuplicateRole {
                    id: repo.id.to_string(),
                    role: role.role.clone(),
                });
            }
            if role.labels.is_empty() {
                return Err(ConfigError::RoleWithNoLabels {
                    id: repo.id.to_string(),
                    role: role.role.clone(),
                });
            }
        }
    }
    Ok(())
}
