use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use fs2::FileExt;
use tempfile::TempDir;

fn folder_sync_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_folder-sync") {
        return PathBuf::from(path);
    }

    let this_test = std::env::current_exe().expect("current_exe");
    let deps_dir = this_test.parent().expect("deps dir");
    let debug_dir = deps_dir.parent().expect("debug dir");

    let direct = debug_dir.join("folder-sync");
    if direct.exists() {
        return direct;
    }

    let mut candidates: Vec<_> = fs::read_dir(deps_dir)
        .expect("read deps dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            name.starts_with("folder_sync-") && !name.ends_with(".d") && p.is_file()
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .expect("unable to locate folder-sync binary in target/debug or target/debug/deps")
}

struct Setup {
    tmp: TempDir,
    config: PathBuf,
}

impl Setup {
    /// One local source `photos`; quarantine on when `filter` is set.
    fn new(filter: bool) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src").join("photos")).unwrap();
        let config = root.join("config.yaml");
        fs::write(
            &config,
            format!(
                "dest_root: {r}/dest\nquarantine_root: {r}/quarantine\n\
                 lockfile: {r}/folder-sync.lock\nstate_db: {r}/state.db\n\
                 disable_progress: true\nsources:\n  - name: photos\n    type: local\n    \
                 path: {r}/src/photos\n    filter_media: {filter}\n    quarantine: {filter}\n",
                r = root.display()
            ),
        )
        .unwrap();
        Self { tmp, config }
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn add_old_file(&self, name: &str) -> PathBuf {
        let path = self.root().join("src").join("photos").join(name);
        fs::write(&path, b"0123456789").unwrap();
        let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(600));
        filetime::set_file_mtime(&path, old).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        std::process::Command::new(folder_sync_bin_path())
            .arg("-c")
            .arg(&self.config)
            .args(args)
            .env_remove("FOLDER_SYNC_CONFIG")
            .output()
            .expect("run folder-sync")
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed: status={} stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr),
    );
}

#[test]
fn sync_links_and_quarantines() {
    let setup = Setup::new(true);
    let jpg = setup.add_old_file("a.jpg");
    let txt = setup.add_old_file("notes.txt");

    let output = setup.run(&["sync"]);
    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(
        stdout.contains("'photos' synced (1 linked, 1 quarantined"),
        "unexpected output: {stdout}"
    );

    let link = setup.root().join("dest").join("photos").join("a.jpg");
    assert_eq!(fs::read_link(&link).unwrap(), jpg);
    assert!(setup
        .root()
        .join("quarantine")
        .join("photos")
        .join("notes.txt")
        .is_file());
    assert!(!txt.exists());

    let again = setup.run(&["sync", "photos"]);
    assert_success(&again);
    let stdout = String::from_utf8(again.stdout).unwrap();
    assert!(stdout.contains("nothing to do (1 unchanged)"), "unexpected output: {stdout}");
}

#[test]
fn dry_run_reports_and_writes_nothing() {
    let setup = Setup::new(false);
    setup.add_old_file("a.jpg");

    let output = setup.run(&["sync", "--dry-run"]);
    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(stdout.contains("[dry-run]"), "missing dry-run prefix");
    assert!(stdout.contains("a.jpg"), "missing a.jpg in output");
    assert!(!setup.root().join("dest").exists(), "dry-run must not create links");
    assert!(!setup.root().join("state.db").exists(), "dry-run must not create state");
}

#[test]
fn deleted_source_file_is_unlinked() {
    let setup = Setup::new(false);
    let jpg = setup.add_old_file("a.jpg");
    assert_success(&setup.run(&["sync", "timer"]));

    fs::remove_file(&jpg).unwrap();
    let output = setup.run(&["sync", "timer"]);
    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("1 links removed"), "unexpected output: {stdout}");
    assert!(!setup.root().join("dest").join("photos").exists());
    assert!(setup.root().join("dest").exists());
}

#[test]
fn held_lock_exits_cleanly_without_syncing() {
    let setup = Setup::new(false);
    setup.add_old_file("a.jpg");

    let lock: File = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(setup.root().join("folder-sync.lock"))
        .unwrap();
    lock.try_lock_exclusive().unwrap();

    let output = setup.run(&["sync"]);
    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("already running"), "unexpected output: {stdout}");
    assert!(!setup.root().join("dest").exists());

    FileExt::unlock(&lock).unwrap();
}

#[test]
fn unknown_source_fails_without_side_effects() {
    let setup = Setup::new(false);
    setup.add_old_file("a.jpg");

    let output = setup.run(&["sync", "holiday"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("holiday"), "unexpected stderr: {stderr}");
    assert!(!setup.root().join("dest").exists());
    assert!(!setup.root().join("state.db").exists());
    assert!(!setup.root().join("folder-sync.lock").exists());
}

#[test]
fn missing_source_root_fails_the_run() {
    let setup = Setup::new(false);
    fs::remove_dir(setup.root().join("src").join("photos")).unwrap();

    let output = setup.run(&["sync"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("'photos' failed"), "unexpected output: {stdout}");
}
