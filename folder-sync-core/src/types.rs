//! Domain types for the folder-sync configuration.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are deserializable via serde + serde_yaml.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a configured source.
///
/// The name doubles as the first path component under both destination roots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceName(pub String);

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SourceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SourceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<Path> for SourceName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where a source's files come from.
///
/// Serialized with an internal `type` tag so the YAML reads
/// `type: local` + `path: ...` or `type: nextcloud` + `tag: ...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceLocation {
    /// A directory tree on the local filesystem.
    Local { path: PathBuf },
    /// Every file carrying a system tag on the remote content service.
    #[serde(alias = "remote")]
    Nextcloud { tag: String },
}

impl SourceLocation {
    /// The kind label persisted alongside every state record.
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceLocation::Local { .. } => SourceKind::Local,
            SourceLocation::Nextcloud { .. } => SourceKind::Nextcloud,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Local,
    Nextcloud,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Nextcloud => "nextcloud",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: SourceName,
    #[serde(flatten)]
    pub location: SourceLocation,
    /// Classify files by extension; only meaningful together with `quarantine`.
    #[serde(default)]
    pub filter_media: bool,
    /// Move non-media files into the quarantine root instead of linking them.
    #[serde(default)]
    pub quarantine: bool,
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        self.location.kind()
    }

    /// Whether a file with this path is diverted into quarantine.
    pub fn quarantines(&self, path: &Path, media: &MediaExtensions) -> bool {
        self.filter_media && self.quarantine && !media.is_media(path)
    }
}

// ---------------------------------------------------------------------------
// Media classification
// ---------------------------------------------------------------------------

/// Extension sets that classify a file as media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaExtensions {
    #[serde(default = "default_image_extensions")]
    pub images: Vec<String>,
    #[serde(default = "default_video_extensions")]
    pub videos: Vec<String>,
}

impl Default for MediaExtensions {
    fn default() -> Self {
        Self {
            images: default_image_extensions(),
            videos: default_video_extensions(),
        }
    }
}

impl MediaExtensions {
    /// Case-insensitive suffix match against both sets.
    ///
    /// Configured entries may be written with or without a leading dot.
    pub fn is_media(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.images
            .iter()
            .chain(self.videos.iter())
            .any(|known| known.trim_start_matches('.').to_lowercase() == ext)
    }
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "bmp", "tif", "tiff"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_video_extensions() -> Vec<String> {
    ["mp4", "mov", "m4v", "avi", "mkv", "webm", "3gp"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Remote service and stability settings
// ---------------------------------------------------------------------------

/// Connection parameters for the Nextcloud WebDAV endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextcloudConfig {
    /// Base DAV URL, e.g. `https://cloud.example.org/remote.php/dav`.
    pub webdav_base: String,
    pub username: String,
    pub app_password: String,
    /// Directory on this host holding the user's files; node paths are
    /// resolved relative to it.
    pub local_data_root: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl NextcloudConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Thresholds for the file stability heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilitySettings {
    #[serde(default = "default_mtime_threshold_ms")]
    pub mtime_threshold_ms: u64,
    #[serde(default = "default_size_delay_ms")]
    pub size_delay_ms: u64,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            mtime_threshold_ms: default_mtime_threshold_ms(),
            size_delay_ms: default_size_delay_ms(),
        }
    }
}

impl StabilitySettings {
    pub fn mtime_threshold(&self) -> Duration {
        Duration::from_millis(self.mtime_threshold_ms)
    }

    pub fn size_delay(&self) -> Duration {
        Duration::from_millis(self.size_delay_ms)
    }
}

fn default_mtime_threshold_ms() -> u64 {
    2_000
}

fn default_size_delay_ms() -> u64 {
    1_000
}

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

/// Root of the folder-sync YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Tree that receives symbolic links.
    pub dest_root: PathBuf,
    /// Tree that receives relocated non-media files.
    pub quarantine_root: PathBuf,
    #[serde(default = "default_lockfile")]
    pub lockfile: PathBuf,
    #[serde(default = "default_state_db")]
    pub state_db: PathBuf,
    #[serde(default)]
    pub disable_progress: bool,
    #[serde(default, rename = "media_ext")]
    pub media: MediaExtensions,
    #[serde(default)]
    pub stability: StabilitySettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nextcloud: Option<NextcloudConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// A config with default settings and no sources.
    pub fn new(dest_root: impl Into<PathBuf>, quarantine_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
            quarantine_root: quarantine_root.into(),
            lockfile: default_lockfile(),
            state_db: default_state_db(),
            disable_progress: false,
            media: MediaExtensions::default(),
            stability: StabilitySettings::default(),
            nextcloud: None,
            sources: Vec::new(),
        }
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name.0 == name)
    }
}

fn default_lockfile() -> PathBuf {
    PathBuf::from("/tmp/folder-sync.lock")
}

fn default_state_db() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("folder-sync")
        .join("state.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(SourceName::from("photos").to_string(), "photos");
    }

    #[test]
    fn media_match_is_case_insensitive() {
        let media = MediaExtensions::default();
        assert!(media.is_media(Path::new("/a/IMG_0001.JPG")));
        assert!(media.is_media(Path::new("clip.Mp4")));
        assert!(!media.is_media(Path::new("notes.txt")));
        assert!(!media.is_media(Path::new("README")));
    }

    #[test]
    fn configured_extensions_may_carry_a_dot() {
        let media = MediaExtensions {
            images: vec![".RAW".to_string()],
            videos: vec![],
        };
        assert!(media.is_media(Path::new("shot.raw")));
        assert!(!media.is_media(Path::new("shot.jpg")));
    }

    #[test]
    fn quarantine_requires_both_flags() {
        let media = MediaExtensions::default();
        let mut source = SourceConfig {
            name: SourceName::from("photos"),
            location: SourceLocation::Local {
                path: PathBuf::from("/srv/photos"),
            },
            filter_media: true,
            quarantine: false,
        };
        let txt = Path::new("b.txt");
        assert!(!source.quarantines(txt, &media));

        source.quarantine = true;
        assert!(source.quarantines(txt, &media));
        assert!(!source.quarantines(Path::new("a.jpg"), &media));

        source.filter_media = false;
        assert!(!source.quarantines(txt, &media));
    }

    #[test]
    fn source_yaml_uses_type_tag() {
        let yaml = "name: family\ntype: nextcloud\ntag: frame\nfilter_media: true\n";
        let source: SourceConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(
            source.location,
            SourceLocation::Nextcloud {
                tag: "frame".to_string()
            }
        );
        assert_eq!(source.kind().as_str(), "nextcloud");
        assert!(source.filter_media);
        assert!(!source.quarantine);
    }

    #[test]
    fn stability_defaults() {
        let settings = StabilitySettings::default();
        assert_eq!(settings.mtime_threshold(), Duration::from_secs(2));
        assert_eq!(settings.size_delay(), Duration::from_secs(1));
    }
}
