use std::path::PathBuf;

use thiserror::Error;

/// Error surface for unit generation.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot generate units: {0}")]
    Invalid(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> UnitError {
    UnitError::Io {
        path: path.into(),
        source,
    }
}
