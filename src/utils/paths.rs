//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! Handles ~/.chat-companion/ and the capture logs directory.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Chat Companion directory (~/.chat-companion/)
pub fn companion_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".chat-companion"))
}

/// Get the config file path (~/.chat-companion/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(companion_dir()?.join("config.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
