//! Configuration loading for Atalaya
//!
//! Provides utilities for loading configuration files from the shared
//! Atalaya config directory (~/.config/atalaya/).
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Initialize the Atalaya config directory.
///
/// Creates ~/.config/atalaya/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Get the Atalaya config directory (~/.config/atalaya/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("atalaya"))
}

/// Get the path to a config file within the Atalaya config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Check if a config file exists in the Atalaya config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Load and parse a JSON config file from the Atalaya config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
