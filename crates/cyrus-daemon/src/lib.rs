// SPDX-License-Identifier: MIT

//! Process entry point for the Cyrus edge worker: config loading, snapshot
//! restore, and a minimal stdin-JSONL driver feeding inbound webhook
//! events to [`cyrus_orchestrator::Runtime`]. A full HTTP/webhook
//! listener, OAuth flow, and CLI UX are out of scope (§1 non-goals); this
//! binary exists only so the crate is runnable end to end.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod error;
pub mod runner_factory;
pub mod stdin_driver;

pub use error::DaemonError;

use cyrus_adapters::{GitWorktreeWorkspaceProvider, HttpTrackerService};
use cyrus_core::{Repository, SystemClock};
use cyrus_orchestrator::{Persistence, Runtime, CLEANUP_RETENTION_MS};
use runner_factory::SubprocessRunnerFactory;
use std::path::PathBuf;
use std::time::Duration;

/// Supplemented feature: how often the terminal-session cleanup sweep
/// runs. Independent of the retention window itself.
const CLEANUP_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct DaemonConfig {
    pub repositories: Vec<Repository>,
    pub state_dir: PathBuf,
    pub tracker_base_url: String,
    pub tracker_api_token: String,
}

/// Resolves every environment-driven setting and validates
/// `repositories.toml`, the way `oj`'s daemon start path resolves state
/// dir and config before touching the filesystem for real.
pub fn load_daemon_config() -> Result<DaemonConfig, DaemonError> {
    let state_dir = env::state_dir()?;
    let repositories = cyrus_config::load_repositories(&env::repositories_config_path()?)?;
    Ok(DaemonConfig {
        repositories,
        state_dir,
        tracker_base_url: env::tracker_base_url()?,
        tracker_api_token: env::tracker_api_token()?,
    })
}

/// Wires the concrete adapters, restores the persisted snapshot, and
/// drives the stdin webhook loop until stdin closes.
pub async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    tokio::fs::create_dir_all(&config.state_dir)
        .await
        .map_err(|source| DaemonError::CreateStateDir { path: config.state_dir.display().to_string(), source })?;

    let tracker = HttpTrackerService::new(config.tracker_base_url, config.tracker_api_token);
    let runner_factory = SubprocessRunnerFactory::from_env();
    let workspace_provider = GitWorktreeWorkspaceProvider;
    let persistence = Persistence::new(config.state_dir.join("state.json"));

    let (runtime, mut outcomes_rx) =
        Runtime::bootstrap(config.repositories, tracker, runner_factory, workspace_provider, SystemClock, persistence)
            .await?;

    let outcomes_task = async {
        while let Some(outcome) = outcomes_rx.recv().await {
            if let Err(e) = runtime.handle_runner_outcome(outcome).await {
                tracing::error!(error = %e, "failed to handle runner outcome");
            }
        }
    };

    let cleanup_task = async {
        let mut ticker = tokio::time::interval(CLEANUP_SWEEP_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            match runtime.run_cleanup_sweep(CLEANUP_RETENTION_MS).await {
                Ok(removed) if !removed.is_empty() => {
                    tracing::info!(count = removed.len(), "cleanup sweep removed terminal sessions")
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "cleanup sweep failed"),
            }
        }
    };

    tokio::select! {
        result = stdin_driver::run(&runtime) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "stdin driver exited with an error");
            }
        }
        _ = outcomes_task => {}
        _ = cleanup_task => {}
    }

    runtime.save_now().await?;
    Ok(())
}
