use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn write_config(root: &Path) -> PathBuf {
    fs::create_dir_all(root.join("src").join("photos")).expect("mkdir photos");
    fs::create_dir_all(root.join("src").join("videos")).expect("mkdir videos");
    let config = root.join("config.yaml");
    fs::write(
        &config,
        format!(
            "dest_root: {r}/dest\nquarantine_root: {r}/quarantine\n\
             lockfile: {r}/folder-sync.lock\nstate_db: {r}/state.db\n\
             disable_progress: true\nsources:\n\
             \x20 - name: photos\n    type: local\n    path: {r}/src/photos\n\
             \x20 - name: videos\n    type: local\n    path: {r}/src/videos\n",
            r = root.display()
        ),
    )
    .expect("write config");
    config
}

fn folder_sync(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("folder-sync").expect("binary");
    cmd.env("FOLDER_SYNC_CONFIG", config);
    cmd
}

#[test]
fn status_before_any_sync_lists_configured_sources() {
    let tmp = TempDir::new().expect("tmp");
    let config = write_config(tmp.path());

    folder_sync(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("photos"))
        .stdout(contains("videos"))
        .stdout(contains("never"));
    assert!(!tmp.path().join("state.db").exists());
}

#[test]
fn status_json_reports_counts_after_sync() {
    let tmp = TempDir::new().expect("tmp");
    let config = write_config(tmp.path());
    let file = tmp.path().join("src").join("photos").join("a.jpg");
    fs::write(&file, b"jpeg").expect("write");
    filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(1_600_000_000, 0))
        .expect("mtime");

    folder_sync(&config).arg("sync").assert().success();

    let output = folder_sync(&config)
        .args(["status", "--json"])
        .output()
        .expect("status");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let sources = json["sources"].as_array().expect("sources array");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["source"], "photos");
    assert_eq!(sources[0]["tracked"], 1);
    assert_eq!(sources[0]["linked"], 1);
    assert_eq!(sources[0]["stale"], 0);
    assert!(sources[0]["last_check"].is_string());
    assert_eq!(sources[1]["tracked"], 0);
}

#[test]
fn units_are_written_for_local_sources() {
    let tmp = TempDir::new().expect("tmp");
    let config = write_config(tmp.path());
    let out = tmp.path().join("units");

    folder_sync(&config)
        .args(["units", "-o"])
        .arg(&out)
        .args(["--binary", "/usr/bin/folder-sync", "--interval", "30min"])
        .assert()
        .success()
        .stdout(contains("folder-sync@photos.path"));

    let path_unit = fs::read_to_string(out.join("folder-sync@videos.path")).expect("path unit");
    assert!(path_unit.contains(&format!(
        "PathModified={}",
        tmp.path().join("src").join("videos").display()
    )));
    let service = fs::read_to_string(out.join("folder-sync@.service")).expect("service");
    assert!(service.contains(&format!(
        r#"ExecStart="/usr/bin/folder-sync" -c "{}" sync %i"#,
        config.display()
    )));
    let timer = fs::read_to_string(out.join("folder-sync.timer")).expect("timer");
    assert!(timer.contains("OnUnitActiveSec=30min"));
}

#[test]
fn missing_config_is_reported() {
    let tmp = TempDir::new().expect("tmp");
    folder_sync(&tmp.path().join("absent.yaml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("config not found"));
}
