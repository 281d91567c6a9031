//! Source adapters: turn a configured source into this pass's entries.
//!
//! Local sources walk a directory tree. Tagged sources ask a [`TagCatalog`]
//! which nodes carry a tag, then expand directories and drop paths that no
//! longer exist. Both produce the same [`Entry`] shape, so the reconciler
//! never cares where a file came from.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use walkdir::WalkDir;

use folder_sync_core::{SourceConfig, SourceLocation};

use crate::error::{io_err, SyncError};

/// One file seen in a source during the current pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub absolute_path: PathBuf,
    /// Relative to the source root; becomes the path under `<root>/<source>/`.
    pub relative_path: PathBuf,
    /// Whole seconds since the Unix epoch.
    pub mtime: i64,
    pub size: u64,
}

impl Entry {
    /// Stat `absolute_path`; `None` when it vanished or is not a regular file.
    fn stat(absolute_path: PathBuf, relative_path: PathBuf) -> Option<Self> {
        let meta = match std::fs::metadata(&absolute_path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path = %absolute_path.display(), error = %e, "skipping unreadable entry");
                return None;
            }
        };
        if !meta.is_file() {
            return None;
        }
        Some(Self {
            mtime: FileTime::from_last_modification_time(&meta).unix_seconds(),
            size: meta.len(),
            absolute_path,
            relative_path,
        })
    }
}

/// "List files for this source."
pub trait SourceAdapter {
    fn list(&self, source: &SourceConfig) -> Result<Vec<Entry>, SyncError>;
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Recursive walk of a local directory tree, sorted by file name.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSource;

impl LocalSource {
    pub fn list_root(&self, root: &Path) -> Result<Vec<Entry>, SyncError> {
        let root = std::path::absolute(root).map_err(|e| io_err(root, e))?;
        if !root.is_dir() {
            return Err(SyncError::MissingRoot { path: root });
        }
        let entries = walk_files(&root)
            .into_iter()
            .filter_map(|path| {
                let relative = path.strip_prefix(&root).ok()?.to_path_buf();
                Entry::stat(path, relative)
            })
            .collect();
        Ok(entries)
    }
}

impl SourceAdapter for LocalSource {
    fn list(&self, source: &SourceConfig) -> Result<Vec<Entry>, SyncError> {
        match &source.location {
            SourceLocation::Local { path } => self.list_root(path),
            other => Err(SyncError::Remote(format!(
                "source '{}' is {}, not local",
                source.name,
                other.kind()
            ))),
        }
    }
}

/// Every file (or symlink to a file) below `root`, skipping unreadable parts.
fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for item in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "skipping unreadable path");
                continue;
            }
        };
        let file_type = item.file_type();
        if file_type.is_file() || (file_type.is_symlink() && item.path().is_file()) {
            files.push(item.into_path());
        }
    }
    files
}

// ---------------------------------------------------------------------------
// Tagged
// ---------------------------------------------------------------------------

/// A node a tag points at, already mapped to a path on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedNode {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// "Given a tag, which nodes carry it?": the remote side of a tagged source.
pub trait TagCatalog {
    fn tagged_nodes(&self, tag: &str) -> Result<Vec<TaggedNode>, SyncError>;
}

/// Adapter over a [`TagCatalog`]; relative paths are computed against the
/// local data root the catalog's paths live under.
pub struct TaggedSource {
    catalog: Box<dyn TagCatalog>,
    data_root: PathBuf,
}

impl TaggedSource {
    pub fn new(catalog: Box<dyn TagCatalog>, data_root: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            data_root: data_root.into(),
        }
    }

    pub fn list_tag(&self, tag: &str) -> Result<Vec<Entry>, SyncError> {
        let nodes = self.catalog.tagged_nodes(tag)?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for node in nodes {
            if !node.path.exists() {
                tracing::debug!(path = %node.path.display(), "tagged node missing locally");
                continue;
            }
            let files = if node.is_dir {
                walk_files(&node.path)
            } else {
                vec![node.path]
            };
            for path in files {
                if !seen.insert(path.clone()) {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.data_root) else {
                    tracing::warn!(
                        path = %path.display(),
                        data_root = %self.data_root.display(),
                        "tagged file outside the data root, skipping"
                    );
                    continue;
                };
                let relative = relative.to_path_buf();
                if let Some(entry) = Entry::stat(path, relative) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }
}

impl SourceAdapter for TaggedSource {
    fn list(&self, source: &SourceConfig) -> Result<Vec<Entry>, SyncError> {
        match &source.location {
            SourceLocation::Nextcloud { tag } => self.list_tag(tag),
            other => Err(SyncError::Remote(format!(
                "source '{}' is {}, not tagged",
                source.name,
                other.kind()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Routes each source to the adapter for its type.
pub struct Sources {
    local: LocalSource,
    tagged: Option<TaggedSource>,
}

impl Sources {
    pub fn new(tagged: Option<TaggedSource>) -> Self {
        Self {
            local: LocalSource,
            tagged,
        }
    }
}

impl SourceAdapter for Sources {
    fn list(&self, source: &SourceConfig) -> Result<Vec<Entry>, SyncError> {
        match &source.location {
            SourceLocation::Local { .. } => self.local.list(source),
            SourceLocation::Nextcloud { .. } => match &self.tagged {
                Some(tagged) => tagged.list(source),
                None => Err(SyncError::Remote(format!(
                    "source '{}' needs a configured remote service",
                    source.name
                ))),
            },
        }
    }
}
