// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine a state directory: $HOME is not set")]
    NoStateDir,

    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("failed to load repositories config: {0}")]
    Config(#[from] cyrus_config::ConfigError),

    #[error("orchestrator runtime error: {0}")]
    Runtime(#[from] cyrus_orchestrator::RuntimeError),

    #[error("failed to create state directory {path}: {source}")]
    CreateStateDir { path: String, #[source] source: std::io::Error },

    #[error("failed to start the tokio runtime: {0}")]
    RuntimeInit(#[source] std::io::Error),
}
