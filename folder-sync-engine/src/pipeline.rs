//! Shared run entrypoint used by the CLI and the generated service units.
//!
//! Order of a run: resolve the selection, take the run lock, open the state
//! store, reconcile each selected source, then clean up once.

use folder_sync_core::{config, Config, Selection, SourceConfig};

use crate::cleanup::{cleanup, cleanup_in, CleanupReport};
use crate::error::SyncError;
use crate::lock::RunLock;
use crate::nextcloud::NextcloudCatalog;
use crate::reconcile::{Reconciler, SourceReport};
use crate::source::{SourceAdapter, Sources, TaggedSource};
use crate::stability::StabilityCheck;
use crate::state::StateStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub show_progress: bool,
}

/// A source whose pass was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    pub failures: Vec<SourceFailure>,
    pub cleanup: CleanupReport,
    pub dry_run: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, source: &SourceConfig, result: Result<SourceReport, SyncError>) {
        match result {
            Ok(source_report) => self.sources.push(source_report),
            Err(e) => {
                tracing::error!(source = %source.name, error = %e, "source pass failed");
                self.failures.push(SourceFailure {
                    source: source.name.0.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Another run holds the lock; nothing was done.
    AlreadyRunning { lockfile: std::path::PathBuf },
    Completed(RunReport),
}

/// Run a full sync for `selection`.
///
/// An unknown source name fails before the lock is taken. Under `dry_run`
/// a missing state database is not created.
pub fn run(
    config: &Config,
    selection: &Selection,
    options: RunOptions,
) -> Result<RunOutcome, SyncError> {
    let selected = config::select(config, selection)?;

    let Some(_lock) = RunLock::try_acquire(&config.lockfile)? else {
        tracing::info!(lockfile = %config.lockfile.display(), "another sync is running, exiting");
        return Ok(RunOutcome::AlreadyRunning {
            lockfile: config.lockfile.clone(),
        });
    };

    let mut store = if options.dry_run && !config.state_db.exists() {
        StateStore::open_in_memory()?
    } else {
        StateStore::open_at(&config.state_db)?
    };
    let sources = build_sources(config);

    let report = run_with(&mut store, config, &selected, &sources, options)?;
    Ok(RunOutcome::Completed(report))
}

/// Reconcile `selected` with `adapter`, then clean up. A failing source is
/// recorded and the remaining sources still run.
///
/// A real run commits each source pass on its own. A dry run shares one
/// transaction across every pass and the cleanup, rolled back at the end, so
/// the cleanup preview sees the flags the passes just computed.
pub fn run_with(
    store: &mut StateStore,
    config: &Config,
    selected: &[&SourceConfig],
    adapter: &dyn SourceAdapter,
    options: RunOptions,
) -> Result<RunReport, SyncError> {
    let mut report = RunReport {
        dry_run: options.dry_run,
        ..RunReport::default()
    };
    let reconciler = Reconciler::new(config)
        .stability(StabilityCheck::from(config.stability))
        .dry_run(options.dry_run)
        .show_progress(options.show_progress && !config.disable_progress);

    if options.dry_run {
        let txn = store.begin()?;
        for source in selected {
            report.record(source, reconciler.reconcile_in(&txn, source, adapter));
        }
        report.cleanup = cleanup_in(&txn, &config.dest_root, true)?;
        txn.rollback()?;
    } else {
        for source in selected {
            report.record(source, reconciler.reconcile(store, source, adapter));
        }
        report.cleanup = cleanup(store, &config.dest_root, false)?;
    }
    Ok(report)
}

fn build_sources(config: &Config) -> Sources {
    let tagged = config.nextcloud.as_ref().map(|nextcloud| {
        TaggedSource::new(
            Box::new(NextcloudCatalog::new(nextcloud)),
            nextcloud.local_data_root.clone(),
        )
    });
    Sources::new(tagged)
}
