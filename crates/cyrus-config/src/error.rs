// SPDX-License-Identifier: MIT

//! Error types for loading and validating repository configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse {path} as TOML: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },

    #[error("repository id {id:?} is declared more than once")]
    DuplicateRepositoryId { id: String },

    #[error("repository {id:?} declares role {role:?} with no labels")]
    RoleWithNoLabels { id: String, role: String },

    #[error("repository {id:?} declares role {role:?} more than once")]
    DuplicateRole { id: String, role: String },
}
