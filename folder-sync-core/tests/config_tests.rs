//! Config loading error-message and selection integration tests.

use assert_fs::prelude::*;
use folder_sync_core::{
    config::{self, Selection},
    ConfigError, SourceLocation,
};
use predicates::prelude::predicate;
use rstest::rstest;

const FULL: &str = r#"
dest_root: /srv/frame
quarantine_root: /srv/quarantine
lockfile: /run/folder-sync.lock
state_db: /var/lib/folder-sync/state.db
disable_progress: true
media_ext:
  images: [jpg, PNG]
  videos: [mp4]
stability:
  mtime_threshold_ms: 5000
nextcloud:
  webdav_base: https://cloud.example.org/remote.php/dav
  username: frame
  app_password: secret
  local_data_root: /var/www/nextcloud/data/frame/files
sources:
  - name: photos
    type: local
    path: /home/me/Pictures
    filter_media: true
    quarantine: true
  - name: family
    type: nextcloud
    tag: frame
"#;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_returns_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("config.yaml");
    let err = config::load_at(&path).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_unknown_source_type_returns_parse_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(
        "dest_root: /a\nquarantine_root: /b\nsources:\n  - name: x\n    type: ftp\n    path: /c\n",
    )
    .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Full document
// ---------------------------------------------------------------------------

#[test]
fn full_document_round_trips_every_section() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(FULL).expect("write");
    file.assert(predicate::str::contains("nextcloud"));

    let cfg = config::load_at(file.path()).expect("load");
    assert!(cfg.disable_progress);
    assert_eq!(cfg.stability.mtime_threshold_ms, 5000);
    assert_eq!(cfg.stability.size_delay_ms, 1000);
    assert!(cfg.media.is_media(std::path::Path::new("a.png")));
    assert!(!cfg.media.is_media(std::path::Path::new("a.gif")));

    let nc = cfg.nextcloud.as_ref().expect("nextcloud section");
    assert_eq!(nc.username, "frame");
    assert_eq!(nc.timeout_secs, 30);

    let family = cfg.source("family").expect("family source");
    assert_eq!(
        family.location,
        SourceLocation::Nextcloud {
            tag: "frame".to_string()
        }
    );
}

// ---------------------------------------------------------------------------
// 3. Selection
// ---------------------------------------------------------------------------

#[rstest]
#[case(None, 2)]
#[case(Some("timer"), 2)]
#[case(Some("photos"), 1)]
#[case(Some("family"), 1)]
fn selection_resolves_expected_sources(#[case] arg: Option<&str>, #[case] expected: usize) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(FULL).expect("write");
    let cfg = config::load_at(file.path()).expect("load");

    let selected = config::select(&cfg, &Selection::from_arg(arg)).expect("select");
    assert_eq!(selected.len(), expected);
}

#[test]
fn reserved_timer_name_is_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(
        "dest_root: /a\nquarantine_root: /b\nsources:\n  - name: timer\n    type: local\n    path: /c\n",
    )
    .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
}
