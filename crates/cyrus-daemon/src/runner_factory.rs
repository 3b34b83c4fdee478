// SPDX-License-Identifier: MIT

//! Maps a [`RunnerSelection`] to the subprocess binary that implements it.
//! One binary path per runner type, configurable via environment variable
//! so a deployment can point each at its own wrapper script.

use async_trait::async_trait;
use cyrus_adapters::{Runner, RunnerFactory, SubprocessRunner};
use cyrus_core::{RunnerSelection, RunnerType};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SubprocessRunnerFactory {
    claude_binary: String,
    codex_binary: String,
    gemini_binary: String,
}

impl SubprocessRunnerFactory {
    pub fn from_env() -> Self {
        Self {
            claude_binary: std::env::var("CYRUS_CLAUDE_BINARY").unwrap_or_else(|_| "claude".to_string()),
            codex_binary: std::env::var("CYRUS_CODEX_BINARY").unwrap_or_else(|_| "codex".to_string()),
            gemini_binary: std::env::var("CYRUS_GEMINI_BINARY").unwrap_or_else(|_| "gemini".to_string()),
        }
    }

    fn binary_for(&self, runner_type: RunnerType) -> &str {
        match runner_type {
            RunnerType::Claude => &self.claude_binary,
            RunnerType::Codex => &self.codex_binary,
            RunnerType::Gemini => &self.gemini_binary,
        }
    }
}

#[async_trait]
impl RunnerFactory for SubprocessRunnerFactory {
    async fn create(&self, selection: &RunnerSelection) -> Arc<dyn Runner> {
        Arc::new(SubprocessRunner::new(
            self.binary_for(selection.runner_type).to_string(),
            selection.resume_session_id.clone(),
        ))
    }
}
