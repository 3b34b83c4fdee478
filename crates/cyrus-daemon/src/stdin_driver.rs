// SPDX-License-Identifier: MIT

//! Minimal line-delimited-JSON driver for local testing: each line of
//! stdin is decoded as a [`WebhookEvent`] and dispatched to the runtime.
//! The real HTTP/webhook intake layer is out of scope (§1 non-goals);
//! this exists so the crate is runnable end to end without one.

use cyrus_adapters::{IssueTrackerService, RunnerFactory, WorkspaceProvider};
use cyrus_core::{Clock, WebhookEvent};
use cyrus_orchestrator::Runtime;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run<T, F, W, C>(runtime: &Runtime<T, F, W, C>) -> std::io::Result<()>
where
    T: IssueTrackerService,
    F: RunnerFactory,
    W: WorkspaceProvider,
    C: Clock,
{
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: WebhookEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "failed to decode webhook event line; skipping");
                continue;
            }
        };

        tracing::info!(kind = event.kind_name(), issue_id = %event.issue_id(), "dispatching webhook event");
        if let Err(e) = runtime.handle_webhook(event).await {
            tracing::error!(error = %e, "webhook dispatch failed");
        }
    }

    Ok(())
}
