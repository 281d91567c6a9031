//! `folder-sync sync`: reconcile sources and clean up.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use folder_sync_core::Selection;
use folder_sync_engine::{
    pipeline::{self, RunOptions, RunOutcome},
    ActionOutcome, CleanupReport, RunReport, SourceReport,
};

/// Arguments for `folder-sync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Source to sync; omit it, or pass `timer`, to sync every source.
    pub source: Option<String>,

    /// Show what would be linked, moved, and removed without doing it.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (_, config) = super::load_config(config_path)?;
        let selection = Selection::from_arg(self.source.as_deref());
        let options = RunOptions {
            dry_run: self.dry_run,
            show_progress: !config.disable_progress && std::io::stderr().is_terminal(),
        };

        let outcome = pipeline::run(&config, &selection, options).context("sync failed")?;
        let report = match outcome {
            RunOutcome::AlreadyRunning { lockfile } => {
                println!(
                    "folder-sync is already running (lock held on {}), exiting",
                    lockfile.display()
                );
                return Ok(());
            }
            RunOutcome::Completed(report) => report,
        };

        print_report(&report);

        if !report.is_success() {
            let names: Vec<_> = report.failures.iter().map(|f| f.source.as_str()).collect();
            bail!("{} source(s) failed: {}", names.len(), names.join(", "));
        }
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    for source in &report.sources {
        print_source(source, prefix);
    }
    for failure in &report.failures {
        println!(
            "{prefix}{} '{}' failed: {}",
            "✗".red().bold(),
            failure.source,
            failure.error
        );
    }
    print_cleanup(&report.cleanup, prefix);
}

fn print_source(report: &SourceReport, prefix: &str) {
    let name = &report.source;
    if report.actions.is_empty() && report.unstable.is_empty() {
        println!(
            "{prefix}✓ '{name}' — nothing to do ({} unchanged)",
            report.unchanged
        );
        return;
    }

    let linked = report.count(|a| {
        matches!(
            a,
            ActionOutcome::Linked { .. } | ActionOutcome::WouldLink { .. }
        )
    });
    let quarantined = report.count(|a| {
        matches!(
            a,
            ActionOutcome::Relocated { .. } | ActionOutcome::WouldRelocate { .. }
        )
    });
    println!(
        "{prefix}✓ '{name}' synced ({linked} linked, {quarantined} quarantined, {} unchanged, {} skipped)",
        report.unchanged,
        report.unstable.len()
    );

    for action in &report.actions {
        match action {
            ActionOutcome::Linked { dest } => println!("  →  {}", dest.display()),
            ActionOutcome::Relocated { dest } => println!("  ⇢  {}", dest.display()),
            ActionOutcome::WouldLink { dest } => println!("  ~  {}", dest.display()),
            ActionOutcome::WouldRelocate { dest } => println!("  ~⇢ {}", dest.display()),
            ActionOutcome::Vanished { source } => {
                println!("  {}  {} (vanished)", "!".yellow(), source.display())
            }
            ActionOutcome::Conflict { dest } => {
                println!("  {}  {} (destination occupied)", "!".yellow(), dest.display())
            }
            ActionOutcome::Failed { dest, reason } => {
                println!("  {}  {} ({reason})", "✗".red(), dest.display())
            }
        }
    }
    for path in &report.unstable {
        println!("  …  {} (still changing, skipped)", path.display());
    }
}

fn print_cleanup(cleanup: &CleanupReport, prefix: &str) {
    if cleanup.removed.is_empty() && cleanup.pruned.is_empty() {
        return;
    }
    println!(
        "{prefix}✓ cleanup ({} links removed, {} directories pruned)",
        cleanup.removed.len(),
        cleanup.pruned.len()
    );
    for path in &cleanup.removed {
        println!("  ✕  {}", path.display());
    }
}
