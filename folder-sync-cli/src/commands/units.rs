//! `folder-sync units`: systemd path, service and timer units.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use folder_sync_units::{paths::DEFAULT_INTERVAL, write_units, UnitOptions};

/// Arguments for `folder-sync units`.
#[derive(Args, Debug)]
pub struct UnitsArgs {
    /// Directory to write the unit files into.
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Binary the units execute [default: this executable].
    #[arg(long)]
    pub binary: Option<PathBuf>,

    /// How often the timer syncs every source (systemd time span).
    #[arg(long, default_value = DEFAULT_INTERVAL)]
    pub interval: String,
}

impl UnitsArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (path, config) = super::load_config(config_path)?;
        let config_file = std::path::absolute(&path)
            .with_context(|| format!("could not resolve {}", path.display()))?;
        let binary = match self.binary {
            Some(binary) => binary,
            None => std::env::current_exe().context("could not determine the executable path")?,
        };

        let mut options = UnitOptions::new(binary, config_file);
        options.interval = self.interval;

        let written = write_units(&config, &options, &self.output_dir).with_context(|| {
            format!("failed to write units to {}", self.output_dir.display())
        })?;
        for path in &written {
            println!("Generated {}", path.display());
        }
        Ok(())
    }
}
