//! File stability heuristic.
//!
//! A file is acted on only when it is unlikely to still be written:
//! 1. Unreadable metadata → `Vanished`.
//! 2. Modified longer ago than the mtime threshold → `Stable`.
//! 3. Otherwise wait the size delay, stat again, and compare size + mtime.
//!
//! A writer that pauses for exactly the delay can still fool this; the next
//! pass re-checks any file whose metadata moved on.

use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, SystemTime};

use filetime::FileTime;

use folder_sync_core::StabilitySettings;

/// Result of a stability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Stable,
    /// Size or mtime moved during the wait.
    Changing,
    /// Metadata could not be read on the first or second stat.
    Vanished,
}

impl Stability {
    pub fn is_stable(self) -> bool {
        self == Stability::Stable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityCheck {
    pub mtime_threshold: Duration,
    pub size_delay: Duration,
}

impl Default for StabilityCheck {
    fn default() -> Self {
        Self::from(StabilitySettings::default())
    }
}

impl From<StabilitySettings> for StabilityCheck {
    fn from(settings: StabilitySettings) -> Self {
        Self {
            mtime_threshold: settings.mtime_threshold(),
            size_delay: settings.size_delay(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    size: u64,
    mtime: FileTime,
}

impl Snapshot {
    fn take(path: &Path) -> Option<(Self, SystemTime)> {
        let meta = std::fs::metadata(path).ok()?;
        let modified = meta.modified().ok()?;
        Some((
            Self {
                size: meta.len(),
                mtime: FileTime::from_last_modification_time(&meta),
            },
            modified,
        ))
    }
}

impl StabilityCheck {
    /// Probe `path`. Blocks for up to `size_delay` when the file is young.
    pub fn probe(&self, path: &Path) -> Stability {
        let Some((first, modified)) = Snapshot::take(path) else {
            return Stability::Vanished;
        };

        // A modification time in the future counts as "just written".
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.mtime_threshold {
            return Stability::Stable;
        }

        tracing::debug!(path = %path.display(), age_ms = age.as_millis() as u64, "recent file, waiting");
        sleep(self.size_delay);

        match Snapshot::take(path) {
            None => Stability::Vanished,
            Some((second, _)) if second == first => Stability::Stable,
            Some(_) => Stability::Changing,
        }
    }

    pub fn is_stable(&self, path: &Path) -> bool {
        self.probe(path).is_stable()
    }
}
