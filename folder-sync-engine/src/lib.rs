//! # folder-sync-engine
//!
//! Incremental mirroring of source trees into a destination of symlinks.
//!
//! Call [`pipeline::run`] for a locked, full run over a selection of
//! sources, or drive a [`Reconciler`] and [`cleanup()`] directly against a
//! [`StateStore`].

pub mod action;
pub mod cleanup;
pub mod error;
pub mod lock;
pub mod nextcloud;
pub mod pipeline;
pub mod reconcile;
pub mod source;
pub mod stability;
pub mod state;

pub use action::ActionOutcome;
pub use cleanup::{cleanup, cleanup_in, CleanupReport};
pub use error::SyncError;
pub use pipeline::{run, RunOptions, RunOutcome, RunReport, SourceFailure};
pub use reconcile::{Reconciler, SourceReport};
pub use source::{Entry, LocalSource, SourceAdapter, TagCatalog, TaggedNode, TaggedSource};
pub use stability::{Stability, StabilityCheck};
pub use state::{FileRecord, SourceSummary, StateStore};
