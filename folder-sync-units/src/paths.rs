use std::path::{Path, PathBuf};

use folder_sync_core::SourceName;

pub const UNIT_PREFIX: &str = "folder-sync";
pub const DEFAULT_INTERVAL: &str = "15min";

/// `folder-sync@.service`, instantiated once per source and once as `timer`.
pub fn service_template_name() -> String {
    format!("{UNIT_PREFIX}@.service")
}

pub fn path_unit_name(source: &SourceName) -> String {
    format!("{UNIT_PREFIX}@{source}.path")
}

pub fn timer_unit_name() -> String {
    format!("{UNIT_PREFIX}.timer")
}

pub fn timer_service_name() -> String {
    format!("{UNIT_PREFIX}@{}.service", folder_sync_core::config::TIMER_TOKEN)
}

pub fn unit_path(output_dir: &Path, unit: &str) -> PathBuf {
    output_dir.join(unit)
}
