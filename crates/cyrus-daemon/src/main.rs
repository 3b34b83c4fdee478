// SPDX-License-Identifier: MIT

use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    info!(event = "daemon.start_started");

    let exit_code = match run() {
        Ok(()) => {
            info!(event = "daemon.start_completed");
            0
        }
        Err(e) => {
            error!(event = "daemon.start_failed", error = %e);
            eprintln!("cyrus-daemon: {e}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), cyrus_daemon::DaemonError> {
    eprintln!("Starting cyrus-daemon in foreground (PID: {})...", std::process::id());

    let config = cyrus_daemon::load_daemon_config().map_err(|e| {
        error!(event = "daemon.config_load_failed", error = %e);
        e
    })?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        error!(event = "daemon.runtime_init_failed", error = %e);
        cyrus_daemon::DaemonError::RuntimeInit(e)
    })?;

    rt.block_on(async {
        cyrus_daemon::run(config).await.map_err(|e| {
            error!(event = "daemon.server_failed", error = %e);
            e
        })
    })
}
