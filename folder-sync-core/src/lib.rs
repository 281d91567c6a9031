//! folder-sync core library: configuration types, loading, source selection.
//!
//! - [`types`]: newtypes and config structs
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load / validate / select

pub mod config;
pub mod error;
pub mod types;

pub use config::Selection;
pub use error::ConfigError;
pub use types::{
    Config, MediaExtensions, NextcloudConfig, SourceConfig, SourceKind, SourceLocation,
    SourceName, StabilitySettings,
};
