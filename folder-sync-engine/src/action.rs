//! Destination materialization.
//!
//! ## `apply`: protocol
//!
//! 1. Source gone → `Vanished`, nothing touched.
//! 2. Create the destination's parent directories.
//! 3. Clear whatever occupies the destination (failure is logged, not fatal).
//! 4. Quarantine: rename the source into place, copying across devices.
//!    Otherwise: symlink the destination to the absolute source path,
//!    clearing and retrying once if the destination reappears.
//!
//! The executor never touches the state store; callers persist after they
//! have seen a successful outcome.

use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

/// Outcome of materializing one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Symbolic link created at `dest`.
    Linked { dest: PathBuf },
    /// Source file moved to `dest`.
    Relocated { dest: PathBuf },
    /// `--dry-run`: a link *would* have been created.
    WouldLink { dest: PathBuf },
    /// `--dry-run`: the source *would* have been moved.
    WouldRelocate { dest: PathBuf },
    /// The source disappeared before it could be acted on.
    Vanished { source: PathBuf },
    /// The destination kept reappearing while linking.
    Conflict { dest: PathBuf },
    /// Anything else went wrong; the filesystem may be partially changed.
    Failed { dest: PathBuf, reason: String },
}

impl ActionOutcome {
    /// True for outcomes after which the destination is known to be in place.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Linked { .. } | ActionOutcome::Relocated { .. }
        )
    }
}

/// Materialize `dest` for `source`.
///
/// `source` must be absolute; links point at it verbatim.
pub fn apply(source: &Path, dest: &Path, quarantined: bool, dry_run: bool) -> ActionOutcome {
    if std::fs::symlink_metadata(source).is_err() {
        return ActionOutcome::Vanished {
            source: source.to_path_buf(),
        };
    }

    if dry_run {
        tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            quarantined,
            "[dry-run] would apply"
        );
        return if quarantined {
            ActionOutcome::WouldRelocate {
                dest: dest.to_path_buf(),
            }
        } else {
            ActionOutcome::WouldLink {
                dest: dest.to_path_buf(),
            }
        };
    }

    if let Some(parent) = dest.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return failed(dest, format!("create {}: {e}", parent.display()));
        }
    }

    clear_destination(dest);

    if quarantined {
        relocate(source, dest)
    } else {
        link(source, dest)
    }
}

/// Remove whatever sits at `dest`. Non-empty directories are left alone.
fn clear_destination(dest: &Path) {
    let Ok(meta) = std::fs::symlink_metadata(dest) else {
        return;
    };
    let result = if meta.is_dir() {
        std::fs::remove_dir(dest)
    } else {
        std::fs::remove_file(dest)
    };
    if let Err(e) = result {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(dest = %dest.display(), error = %e, "could not clear destination");
        }
    }
}

fn link(source: &Path, dest: &Path) -> ActionOutcome {
    match symlink(source, dest) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::debug!(dest = %dest.display(), "destination reappeared, retrying link");
            clear_destination(dest);
            match symlink(source, dest) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!(dest = %dest.display(), "destination still occupied after retry");
                    return ActionOutcome::Conflict {
                        dest: dest.to_path_buf(),
                    };
                }
                Err(e) => return failed(dest, format!("symlink: {e}")),
            }
        }
        Err(e) => return failed(dest, format!("symlink: {e}")),
    }
    tracing::debug!(source = %source.display(), dest = %dest.display(), "linked");
    ActionOutcome::Linked {
        dest: dest.to_path_buf(),
    }
}

fn relocate(source: &Path, dest: &Path) -> ActionOutcome {
    tracing::info!(source = %source.display(), dest = %dest.display(), "quarantining");
    match std::fs::rename(source, dest) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return ActionOutcome::Vanished {
                source: source.to_path_buf(),
            };
        }
        Err(e) if e.kind() == ErrorKind::CrossesDevices => return copy_then_remove(source, dest),
        Err(e) => return failed(dest, format!("rename: {e}")),
    }
    ActionOutcome::Relocated {
        dest: dest.to_path_buf(),
    }
}

/// Move for when `rename` cannot cross filesystems. A partial copy is
/// removed; a source that cannot be removed after copying only warns.
fn copy_then_remove(source: &Path, dest: &Path) -> ActionOutcome {
    if let Err(e) = std::fs::copy(source, dest) {
        let _ = std::fs::remove_file(dest);
        return failed(dest, format!("copy across devices: {e}"));
    }
    if let Err(e) = std::fs::remove_file(source) {
        tracing::warn!(
            source = %source.display(),
            error = %e,
            "copied into quarantine but could not remove the original"
        );
    }
    ActionOutcome::Relocated {
        dest: dest.to_path_buf(),
    }
}

fn failed(dest: &Path, reason: String) -> ActionOutcome {
    tracing::warn!(dest = %dest.display(), %reason, "action failed");
    ActionOutcome::Failed {
        dest: dest.to_path_buf(),
        reason,
    }
}
