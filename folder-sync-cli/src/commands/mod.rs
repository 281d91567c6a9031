pub mod status;
pub mod sync;
pub mod units;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use folder_sync_core::{config, Config};

/// The config file to use: `-c`/`FOLDER_SYNC_CONFIG`, else the default.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(config::expand_tilde(path)),
        None => config::default_path().context("could not determine the config directory"),
    }
}

pub fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, Config)> {
    let path = config_path(explicit)?;
    let config = config::load_at(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok((path, config))
}
