//! Post-pass cleanup of destinations whose source file is gone.
//!
//! Runs once per invocation, after every selected source has been
//! reconciled, over every row in the store with `exists_in_source = 0`.
//! Quarantined rows are retired without touching the quarantine tree: the
//! moved file *is* the only copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::reconcile::destination;
use crate::state::{StateStore, StateTxn};
use folder_sync_core::SourceName;

/// What a cleanup pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Destination links removed (or that would be, under `--dry-run`).
    pub removed: Vec<PathBuf>,
    /// Directories pruned because they became empty.
    pub pruned: Vec<PathBuf>,
    /// Stale rows processed.
    pub retired: usize,
}

/// Remove destination links of stale rows, prune emptied directories below
/// `dest_root`, and mark those rows as no longer in the destination.
pub fn cleanup(
    store: &mut StateStore,
    dest_root: &Path,
    dry_run: bool,
) -> Result<CleanupReport, SyncError> {
    let txn = store.begin()?;
    let report = cleanup_in(&txn, dest_root, dry_run)?;
    if dry_run {
        txn.rollback()?;
    } else {
        txn.commit()?;
    }
    Ok(report)
}

/// [`cleanup`] inside a caller-owned transaction, so it sees the flags of
/// source passes that have not been committed.
pub fn cleanup_in(
    txn: &StateTxn<'_>,
    dest_root: &Path,
    dry_run: bool,
) -> Result<CleanupReport, SyncError> {
    let mut report = CleanupReport::default();

    for record in txn.stale()? {
        if !record.quarantined {
            let dest = destination(
                dest_root,
                &SourceName(record.source_name.clone()),
                &record.relative_path,
            );
            if remove_link(&dest, dry_run) {
                report.removed.push(dest.clone());
            }
            // The link may already be gone while its parents are still empty.
            if !dry_run {
                report.pruned.extend(prune_empty_dirs(&dest, dest_root));
            }
        }
        txn.retire(&record.source_path)?;
        report.retired += 1;
    }

    tracing::info!(
        stale = report.retired,
        removed = report.removed.len(),
        pruned = report.pruned.len(),
        "cleanup complete"
    );
    Ok(report)
}

/// Remove the symlink at `dest`. Anything that is not a symlink is left in
/// place. Returns whether a link was (or would be) removed.
fn remove_link(dest: &Path, dry_run: bool) -> bool {
    let meta = match std::fs::symlink_metadata(dest) {
        Ok(meta) => meta,
        Err(_) => return false,
    };
    if !meta.file_type().is_symlink() {
        tracing::warn!(dest = %dest.display(), "destination is not a link, leaving it");
        return false;
    }
    if dry_run {
        tracing::info!(dest = %dest.display(), "[dry-run] would remove link");
        return true;
    }
    match std::fs::remove_file(dest) {
        Ok(()) => {
            tracing::debug!(dest = %dest.display(), "removed link");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(dest = %dest.display(), error = %e, "could not remove link");
            false
        }
    }
}

/// Walk upward from `leaf`'s parent removing empty directories. Stops at the
/// first non-empty or unreadable directory, and never removes `root` itself.
pub fn prune_empty_dirs(leaf: &Path, root: &Path) -> Vec<PathBuf> {
    let mut pruned = Vec::new();
    let mut current = leaf.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        let empty = match std::fs::read_dir(dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        };
        if !empty {
            break;
        }
        if let Err(e) = std::fs::remove_dir(dir) {
            tracing::debug!(dir = %dir.display(), error = %e, "stopped pruning");
            break;
        }
        pruned.push(dir.to_path_buf());
        current = dir.parent();
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    use folder_sync_core::SourceKind;
    use tempfile::TempDir;

    use crate::state::RecordUpdate;

    fn record(store: &mut StateStore, source: &Path, relative: &str, quarantined: bool) {
        let txn = store.begin().unwrap();
        txn.upsert(&RecordUpdate {
            source_name: "photos",
            source_kind: SourceKind::Local,
            source_path: source,
            relative_path: Path::new(relative),
            mtime: 1,
            size: 1,
            quarantined,
        })
        .unwrap();
        txn.mark_in_dest(source).unwrap();
        txn.commit().unwrap();
    }

    fn go_stale(store: &mut StateStore) {
        let txn = store.begin().unwrap();
        txn.reset_source("photos").unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn prune_stops_at_root_and_non_empty_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("dest");
        let deep = root.join("photos").join("2024").join("june");
        fs::create_dir_all(&deep).unwrap();
        fs::write(root.join("photos").join("keep.jpg"), b"x").unwrap();

        let pruned = prune_empty_dirs(&deep.join("a.jpg"), &root);
        assert_eq!(pruned, vec![deep.clone(), root.join("photos").join("2024")]);
        assert!(root.join("photos").exists());

        let lonely = root.join("solo");
        fs::create_dir_all(&lonely).unwrap();
        prune_empty_dirs(&lonely.join("x"), &root);
        assert!(!lonely.exists());
        assert!(root.exists(), "root itself is never pruned");
    }

    #[test]
    fn stale_link_is_removed_and_parents_pruned() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("dest");
        let source = tmp.path().join("src").join("sub").join("a.jpg");
        let dest = root.join("photos").join("sub").join("a.jpg");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        symlink(&source, &dest).unwrap();

        let mut store = StateStore::open_in_memory().unwrap();
        record(&mut store, &source, "sub/a.jpg", false);
        go_stale(&mut store);

        let report = cleanup(&mut store, &root, false).unwrap();
        assert_eq!(report.removed, vec![dest.clone()]);
        assert_eq!(report.retired, 1);
        assert!(fs::symlink_metadata(&dest).is_err());
        assert!(!root.join("photos").exists());
        assert!(root.exists());

        let row = store.find(&source).unwrap().unwrap();
        assert!(!row.exists_in_source && !row.exists_in_dest);
    }

    #[test]
    fn quarantined_rows_are_retired_without_touching_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("dest");
        let source = tmp.path().join("src").join("b.txt");
        let sibling = root.join("photos").join("b.txt");
        fs::create_dir_all(sibling.parent().unwrap()).unwrap();
        symlink(&source, &sibling).unwrap();

        let mut store = StateStore::open_in_memory().unwrap();
        record(&mut store, &source, "b.txt", true);
        go_stale(&mut store);

        let report = cleanup(&mut store, &root, false).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.retired, 1);
        assert!(fs::symlink_metadata(&sibling).is_ok());
    }

    #[test]
    fn regular_file_at_destination_is_kept() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("dest");
        let source = tmp.path().join("src").join("a.jpg");
        let dest = root.join("photos").join("a.jpg");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"user data").unwrap();

        let mut store = StateStore::open_in_memory().unwrap();
        record(&mut store, &source, "a.jpg", false);
        go_stale(&mut store);

        cleanup(&mut store, &root, false).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"user data");
    }

    #[test]
    fn dry_run_reports_without_removing() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("dest");
        let source = tmp.path().join("src").join("a.jpg");
        let dest = root.join("photos").join("a.jpg");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        symlink(&source, &dest).unwrap();

        let mut store = StateStore::open_in_memory().unwrap();
        record(&mut store, &source, "a.jpg", false);
        go_stale(&mut store);
        let before = store.records().unwrap();

        let report = cleanup(&mut store, &root, true).unwrap();
        assert_eq!(report.removed, vec![dest.clone()]);
        assert!(fs::symlink_metadata(&dest).is_ok());
        assert_eq!(store.records().unwrap(), before);
    }

    #[test]
    fn empty_parents_are_pruned_when_link_is_already_gone() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("dest");
        let source = tmp.path().join("src").join("2024").join("a.jpg");
        let dir = root.join("photos").join("2024");
        fs::create_dir_all(&dir).unwrap();

        let mut store = StateStore::open_in_memory().unwrap();
        record(&mut store, &source, "2024/a.jpg", false);
        go_stale(&mut store);

        let report = cleanup(&mut store, &root, false).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.pruned, vec![dir.clone(), root.join("photos")]);
        assert!(!dir.exists());
        assert!(root.exists());
    }
}
