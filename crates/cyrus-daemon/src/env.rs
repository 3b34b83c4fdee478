// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon binary.

use std::path::PathBuf;

/// Resolve state directory: `CYRUS_STATE_DIR` > `XDG_STATE_HOME/cyrus` >
/// `~/.local/state/cyrus`.
pub fn state_dir() -> Result<PathBuf, crate::DaemonError> {
    if let Ok(dir) = std::env::var("CYRUS_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cyrus"));
    }
    let home = std::env::var("HOME").map_err(|_| crate::DaemonError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/cyrus"))
}

/// Path to `repositories.toml`, defaulting to the state dir.
pub fn repositories_config_path() -> Result<PathBuf, crate::DaemonError> {
    if let Ok(path) = std::env::var("CYRUS_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }
    Ok(state_dir()?.join("repositories.toml"))
}

pub fn tracker_base_url() -> Result<String, crate::DaemonError> {
    std::env::var("CYRUS_TRACKER_BASE_URL").map_err(|_| crate::DaemonError::MissingEnv("CYRUS_TRACKER_BASE_URL"))
}

pub fn tracker_api_token() -> Result<String, crate::DaemonError> {
    std::env::var("CYRUS_TRACKER_API_TOKEN").map_err(|_| crate::DaemonError::MissingEnv("CYRUS_TRACKER_API_TOKEN"))
}
