//! One source's reconciliation pass.
//!
//! Entries are diffed against the state store on `(mtime, size)`. Only a
//! changed entry, or one whose destination is missing, is probed for
//! stability and materialized; its row is written after the action is
//! confirmed. Every listed entry is marked present regardless, and the pass
//! commits once at the end.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use folder_sync_core::{Config, MediaExtensions, SourceConfig, SourceName};

use crate::action::{self, ActionOutcome};
use crate::error::SyncError;
use crate::source::{Entry, SourceAdapter};
use crate::stability::{Stability, StabilityCheck};
use crate::state::{RecordUpdate, StateStore, StateTxn};

/// `<root>/<source name>/<relative path>`.
pub fn destination(root: &Path, source: &SourceName, relative: &Path) -> PathBuf {
    root.join(source).join(relative)
}

/// Outcome of reconciling one source.
#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub source: String,
    /// Entries the adapter listed.
    pub entries: usize,
    /// Every action the executor was asked to perform, in traversal order.
    pub actions: Vec<ActionOutcome>,
    /// Entries with matching metadata and a destination already in place.
    pub unchanged: usize,
    /// Entries skipped because they were still being written or vanished.
    pub unstable: Vec<PathBuf>,
}

impl SourceReport {
    pub fn applied(&self) -> usize {
        self.actions.iter().filter(|a| a.is_applied()).count()
    }

    pub fn count(&self, pred: impl Fn(&ActionOutcome) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(a)).count()
    }
}

/// Settings shared by every entry of a pass.
#[derive(Debug, Clone, Copy)]
struct PassContext<'a> {
    dest_root: &'a Path,
    quarantine_root: &'a Path,
    media: &'a MediaExtensions,
    stability: StabilityCheck,
    dry_run: bool,
}

/// Drives source passes. The [`StateStore`] is borrowed per pass.
pub struct Reconciler<'a> {
    ctx: PassContext<'a>,
    show_progress: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            ctx: PassContext {
                dest_root: &config.dest_root,
                quarantine_root: &config.quarantine_root,
                media: &config.media,
                stability: StabilityCheck::from(config.stability),
                dry_run: false,
            },
            show_progress: !config.disable_progress,
        }
    }

    pub fn stability(mut self, check: StabilityCheck) -> Self {
        self.ctx.stability = check;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.ctx.dry_run = dry_run;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Reconcile `source` in its own transaction, committed at the end of
    /// the pass (rolled back under dry-run).
    pub fn reconcile(
        &self,
        store: &mut StateStore,
        source: &SourceConfig,
        adapter: &dyn SourceAdapter,
    ) -> Result<SourceReport, SyncError> {
        let txn = store.begin()?;
        let report = self.reconcile_in(&txn, source, adapter)?;
        if self.ctx.dry_run {
            txn.rollback()?;
        } else {
            txn.commit()?;
        }
        Ok(report)
    }

    /// Reconcile `source` inside a caller-owned transaction.
    ///
    /// An adapter failure returns before any row is touched; the source's
    /// rows keep their previous flags.
    pub fn reconcile_in(
        &self,
        txn: &StateTxn<'_>,
        source: &SourceConfig,
        adapter: &dyn SourceAdapter,
    ) -> Result<SourceReport, SyncError> {
        // Listed before the reset so a failed listing leaves the flags alone.
        let entries = adapter.list(source)?;
        let mut report = SourceReport {
            source: source.name.0.clone(),
            entries: entries.len(),
            ..SourceReport::default()
        };

        let reset = txn.reset_source(&source.name.0)?;
        tracing::debug!(source = %source.name, entries = entries.len(), reset, "starting pass");

        let bar = progress_bar(entries.len(), &source.name, self.show_progress);
        for entry in &entries {
            self.ctx.reconcile_entry(txn, source, entry, &mut report)?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        tracing::info!(
            source = %source.name,
            entries = report.entries,
            applied = report.applied(),
            unchanged = report.unchanged,
            unstable = report.unstable.len(),
            "source pass complete"
        );
        Ok(report)
    }
}

impl PassContext<'_> {
    fn reconcile_entry(
        &self,
        txn: &StateTxn<'_>,
        source: &SourceConfig,
        entry: &Entry,
        report: &mut SourceReport,
    ) -> Result<(), SyncError> {
        let path = entry.absolute_path.as_path();
        let quarantined = source.quarantines(path, self.media);
        let root = if quarantined {
            self.quarantine_root
        } else {
            self.dest_root
        };
        let dest = destination(root, &source.name, &entry.relative_path);

        let record = txn.find(path)?;
        let changed = record
            .as_ref()
            .map_or(true, |r| !r.matches(entry.mtime, entry.size));

        if changed || !dest.exists() {
            match self.stability.probe(path) {
                Stability::Stable => {
                    let outcome = action::apply(path, &dest, quarantined, self.dry_run);
                    if outcome.is_applied() {
                        txn.upsert(&RecordUpdate {
                            source_name: &source.name.0,
                            source_kind: source.kind(),
                            source_path: path,
                            relative_path: &entry.relative_path,
                            mtime: entry.mtime,
                            size: entry.size,
                            quarantined,
                        })?;
                        txn.mark_in_dest(path)?;
                    }
                    report.actions.push(outcome);
                }
                unstable => {
                    tracing::warn!(path = %path.display(), state = ?unstable, "skipping unstable file");
                    report.unstable.push(path.to_path_buf());
                }
            }
        } else {
            txn.mark_in_dest(path)?;
            report.unchanged += 1;
        }

        txn.mark_in_source(path)?;
        Ok(())
    }
}

fn progress_bar(len: usize, source: &SourceName, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len} files ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style.progress_chars("=> "));
    bar.set_message(format!("Syncing {source}"));
    bar
}
