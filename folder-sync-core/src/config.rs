//! YAML configuration loading and source selection.
//!
//! # Layout
//!
//! ```text
//! dest_root: ~/photoframe
//! quarantine_root: ~/photoframe-quarantine
//! lockfile: /tmp/folder-sync.lock
//! state_db: ~/.local/share/folder-sync/state.db
//! disable_progress: false
//! media_ext: { images: [jpg, png], videos: [mp4] }
//! nextcloud: { webdav_base: ..., username: ..., app_password: ..., local_data_root: ... }
//! sources:
//!   - { name: photos, type: local, path: ~/Pictures, filter_media: true, quarantine: true }
//!   - { name: family, type: nextcloud, tag: frame }
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit path; used in tests with `TempDir`
//! - `load()`: resolves [`default_path`], delegates to `load_at`

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::{Config, SourceConfig, SourceKind, SourceLocation};

/// Scheduler-originated selector that means "every source".
pub const TIMER_TOKEN: &str = "timer";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<config dir>/folder-sync/config.yaml`: pure, no I/O.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("folder-sync").join("config.yaml"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading `~`, or when no home directory is known, are
/// returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load, expand, and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML,
/// `ConfigError::Invalid` if the content is inconsistent.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let config = expand_paths(config);
    validate(&config)?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&default_path()?)
}

fn expand_paths(mut config: Config) -> Config {
    config.dest_root = expand_tilde(&config.dest_root);
    config.quarantine_root = expand_tilde(&config.quarantine_root);
    config.lockfile = expand_tilde(&config.lockfile);
    config.state_db = expand_tilde(&config.state_db);
    if let Some(nc) = config.nextcloud.as_mut() {
        nc.local_data_root = expand_tilde(&nc.local_data_root);
    }
    for source in &mut config.sources {
        if let SourceLocation::Local { path } = &mut source.location {
            *path = expand_tilde(path);
        }
    }
    config
}

// ---------------------------------------------------------------------------
// 3. Validate
// ---------------------------------------------------------------------------

/// Reject configs the engine cannot run safely.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.dest_root == config.quarantine_root {
        return Err(ConfigError::Invalid(
            "dest_root and quarantine_root must differ".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        let name = source.name.0.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid("source with empty name".to_string()));
        }
        if name.contains('/') || name == "." || name == ".." {
            return Err(ConfigError::Invalid(format!(
                "source name '{name}' must be a single path component"
            )));
        }
        if name == TIMER_TOKEN {
            return Err(ConfigError::Invalid(format!(
                "source name '{TIMER_TOKEN}' is reserved for scheduled runs"
            )));
        }
        if !seen.insert(name) {
            return Err(ConfigError::Invalid(format!("duplicate source name '{name}'")));
        }
        if source.kind() == SourceKind::Nextcloud && config.nextcloud.is_none() {
            return Err(ConfigError::Invalid(format!(
                "source '{name}' is of type nextcloud but no `nextcloud` section is configured"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Select
// ---------------------------------------------------------------------------

/// Which sources a run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every configured source.
    All,
    /// Exactly one named source.
    Named(String),
}

impl Selection {
    /// Interpret the CLI selector: none or the timer token means all sources.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some(TIMER_TOKEN) => Selection::All,
            Some(name) => Selection::Named(name.to_string()),
        }
    }
}

/// Resolve a selection against the configured sources, in config order.
pub fn select<'a>(
    config: &'a Config,
    selection: &Selection,
) -> Result<Vec<&'a SourceConfig>, ConfigError> {
    match selection {
        Selection::All => Ok(config.sources.iter().collect()),
        Selection::Named(name) => config
            .source(name)
            .map(|s| vec![s])
            .ok_or_else(|| ConfigError::UnknownSource {
                name: name.clone(),
                known: config
                    .sources
                    .iter()
                    .map(|s| s.name.0.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
