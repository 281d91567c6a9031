use std::fs;
use std::path::{Path, PathBuf};

use folder_sync_core::{Config, SourceLocation, SourceName};

use crate::error::{io_err, UnitError};
use crate::paths::{
    path_unit_name, service_template_name, timer_service_name, timer_unit_name, unit_path,
    DEFAULT_INTERVAL,
};

/// What the generated units run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOptions {
    /// Absolute path of the `folder-sync` binary.
    pub binary: PathBuf,
    /// Config file passed with `-c`.
    pub config: PathBuf,
    /// `OnUnitActiveSec=` of the periodic timer, in systemd time syntax.
    pub interval: String,
}

impl UnitOptions {
    pub fn new(binary: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config: config.into(),
            interval: DEFAULT_INTERVAL.to_string(),
        }
    }
}

/// Path unit that starts `folder-sync@<name>.service` when `folder` changes.
pub fn generate_path_unit(name: &SourceName, folder: &Path) -> String {
    format!(
        r#"[Unit]
Description=Watch local source '{name}' for folder-sync

[Path]
PathModified={folder}

[Install]
WantedBy=multi-user.target
"#,
        name = name,
        folder = folder.display()
    )
}

/// Oneshot template; the instance name is the source to sync.
pub fn generate_service_template(options: &UnitOptions) -> String {
    format!(
        r#"[Unit]
Description=folder-sync run for %i

[Service]
Type=oneshot
ExecStart="{binary}" -c "{config}" sync %i
"#,
        binary = options.binary.display(),
        config = options.config.display()
    )
}

pub fn generate_timer(options: &UnitOptions) -> String {
    format!(
        r#"[Unit]
Description=Periodic folder-sync of every source

[Timer]
OnBootSec=2min
OnUnitActiveSec={interval}
Unit={service}

[Install]
WantedBy=timers.target
"#,
        interval = options.interval,
        service = timer_service_name()
    )
}

/// Write every unit for `config` into `output_dir`, returning the paths
/// written. Only local sources get a path unit.
pub fn write_units(
    config: &Config,
    options: &UnitOptions,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, UnitError> {
    if options.interval.trim().is_empty() {
        return Err(UnitError::Invalid("timer interval is empty".to_string()));
    }
    if !output_dir.exists() {
        fs::create_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;
    }

    let mut units = vec![
        (service_template_name(), generate_service_template(options)),
        (timer_unit_name(), generate_timer(options)),
    ];
    for source in &config.sources {
        match &source.location {
            SourceLocation::Local { path } => {
                units.push((path_unit_name(&source.name), generate_path_unit(&source.name, path)));
            }
            SourceLocation::Nextcloud { .. } => {
                tracing::debug!(source = %source.name, "no path unit for remote source");
            }
        }
    }

    let mut written = Vec::with_capacity(units.len());
    for (name, content) in units {
        let path = unit_path(output_dir, &name);
        fs::write(&path, content).map_err(|e| io_err(&path, e))?;
        tracing::info!(unit = %path.display(), "generated unit");
        written.push(path);
    }
    Ok(written)
}
