//! `folder-sync status`: what the state store knows about each source.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use folder_sync_core::Config;
use folder_sync_engine::{SourceSummary, StateStore};

/// Arguments for `folder-sync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (_, config) = super::load_config(config_path)?;

        let summaries = if config.state_db.exists() {
            StateStore::open_at(&config.state_db)
                .and_then(|store| store.summary())
                .with_context(|| {
                    format!("failed to read state store {}", config.state_db.display())
                })?
        } else {
            Vec::new()
        };

        let rows = build_rows(&config, summaries);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&StatusJson {
                    state_db: config.state_db.display().to_string(),
                    sources: rows,
                })
                .context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&config, rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct SourceStatus {
    source: String,
    #[serde(rename = "type")]
    kind: String,
    configured: bool,
    tracked: u64,
    present: u64,
    linked: u64,
    quarantined: u64,
    stale: u64,
    last_check: Option<String>,
}

#[derive(Serialize)]
struct StatusJson {
    state_db: String,
    sources: Vec<SourceStatus>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "type")]
    kind: String,
    #[tabled(rename = "tracked")]
    tracked: u64,
    #[tabled(rename = "present")]
    present: u64,
    #[tabled(rename = "linked")]
    linked: u64,
    #[tabled(rename = "quarantined")]
    quarantined: u64,
    #[tabled(rename = "stale")]
    stale: u64,
    #[tabled(rename = "last check")]
    last_check: String,
}

/// One row per configured source, followed by sources that only remain in
/// the store.
fn build_rows(config: &Config, mut summaries: Vec<SourceSummary>) -> Vec<SourceStatus> {
    let mut rows = Vec::with_capacity(config.sources.len() + summaries.len());
    for source in &config.sources {
        let summary = summaries
            .iter()
            .position(|s| s.source_name == source.name.0)
            .map(|i| summaries.remove(i));
        rows.push(match summary {
            Some(summary) => from_summary(summary, true),
            None => SourceStatus {
                source: source.name.0.clone(),
                kind: source.kind().to_string(),
                configured: true,
                tracked: 0,
                present: 0,
                linked: 0,
                quarantined: 0,
                stale: 0,
                last_check: None,
            },
        });
    }
    rows.extend(summaries.into_iter().map(|s| from_summary(s, false)));
    rows
}

fn from_summary(summary: SourceSummary, configured: bool) -> SourceStatus {
    SourceStatus {
        source: summary.source_name,
        kind: summary.source_type,
        configured,
        tracked: summary.tracked,
        present: summary.present,
        linked: summary.linked,
        quarantined: summary.quarantined,
        stale: summary.stale,
        last_check: summary
            .last_check
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339()),
    }
}

fn print_table(config: &Config, rows: Vec<SourceStatus>) {
    println!(
        "folder-sync v{} | {} sources | dest {} | quarantine {}",
        env!("CARGO_PKG_VERSION"),
        config.sources.len(),
        config.dest_root.display(),
        config.quarantine_root.display(),
    );

    if rows.is_empty() {
        println!("No sources configured.");
        return;
    }

    let unconfigured = rows.iter().filter(|r| !r.configured).count();
    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            source: if row.configured {
                row.source
            } else {
                format!("{} (removed)", row.source).bright_black().to_string()
            },
            kind: row.kind,
            tracked: row.tracked,
            present: row.present,
            linked: row.linked,
            quarantined: row.quarantined,
            stale: row.stale,
            last_check: row
                .last_check
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|dt| format_age(dt.with_timezone(&Utc)))
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if unconfigured > 0 {
        println!("{unconfigured} source(s) in the state store are no longer configured.");
    }
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    let age = if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 60 * 60 {
        format!("{}m", seconds / 60)
    } else if seconds < 60 * 60 * 24 {
        format!("{}h", seconds / (60 * 60))
    } else {
        format!("{}d", seconds / (60 * 60 * 24))
    };
    format!("{age} ago")
}
