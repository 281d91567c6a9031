//! Error types for folder-sync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// The config parsed but describes an unusable setup.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// A source was requested by name but is not configured.
    #[error("no source named '{name}' (configured: {known})")]
    UnknownSource { name: String, known: String },

    /// `dirs::config_dir()` returned `None`: cannot locate the default config.
    #[error("cannot determine config directory; pass --config explicitly")]
    ConfigDirNotFound,
}
