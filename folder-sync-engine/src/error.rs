//! Error types for folder-sync-engine.

use std::path::PathBuf;

use thiserror::Error;

use folder_sync_core::ConfigError;

/// All errors that can arise from sync operations.
///
/// Per-file problems (vanished files, failed links) are reported as outcome
/// values instead; these errors abort a source pass or the whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from config resolution.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State store (SQLite) failure.
    #[error("state store error: {0}")]
    State(#[from] rusqlite::Error),

    /// A source root that must exist for a pass to be meaningful.
    #[error("source root {path} does not exist or is not a directory")]
    MissingRoot { path: PathBuf },

    /// The remote service answered, but not with what we asked for.
    #[error("remote listing failed: {0}")]
    Remote(String),

    /// Transport-level failure talking to the remote service.
    #[error("remote request failed: {0}")]
    Http(#[from] Box<ureq::Error>),

    /// Remote response body was not well-formed XML.
    #[error("malformed remote response: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
