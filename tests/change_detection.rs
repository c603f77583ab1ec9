// tests/change_detection.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use devloop::cli::GlobalArgs;
use devloop::config::{merge, Settings};
use devloop::fs::RealFileSystem;
use devloop::watch::{ChangeDetector, NotifyDetector, PollingDetector, ScanCursor, WatchRule};

type TestResult = Result<(), Box<dyn Error>>;

const INTERVAL: Duration = Duration::from_millis(20);

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn poller(root: &Path, excluded: &[&str]) -> PollingDetector {
    let excluded: Vec<String> = excluded.iter().map(|s| s.to_string()).collect();
    let rule = WatchRule::new(root, &excluded, false, "go").unwrap();
    PollingDetector::new(Arc::new(RealFileSystem), rule, ScanCursor::now(), INTERVAL).unwrap()
}

/// Coarse filesystem timestamps can lag the wall clock slightly.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn edits_under_excluded_dirs_are_ignored() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "main.go", "package main");
    write(dir.path(), "vendor/dep/dep.go", "package dep");
    let mut detector = poller(dir.path(), &["vendor"]);
    settle().await;

    write(dir.path(), "vendor/dep/dep.go", "package dep // edited");
    write(dir.path(), ".git/HEAD.go", "ref");
    let quiet = tokio::time::timeout(Duration::from_millis(200), detector.wait_for_change()).await;
    assert!(quiet.is_err(), "excluded and VCS edits must not trigger");

    write(dir.path(), "main.go", "package main // edited");
    let changed = with_timeout(detector.wait_for_change()).await?;
    assert_eq!(changed, dir.path().join("main.go"));
    Ok(())
}

#[tokio::test]
async fn a_burst_of_edits_is_one_trigger() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "a.go", "package a");
    let mut detector = poller(dir.path(), &[]);
    settle().await;

    write(dir.path(), "a.go", "package a // 1");
    write(dir.path(), "b.go", "package b");
    write(dir.path(), "pkg/c.go", "package c");

    let first = with_timeout(detector.wait_for_change()).await?;
    assert_eq!(first, dir.path().join("a.go"));

    let again = tokio::time::timeout(Duration::from_millis(200), detector.wait_for_change()).await;
    assert!(again.is_err(), "edits before the trigger collapse into it");
    Ok(())
}

#[tokio::test]
async fn non_source_files_do_not_trigger() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut detector = poller(dir.path(), &[]);
    settle().await;

    write(dir.path(), "README.md", "# readme");
    write(dir.path(), ".main.go.swp", "swap");
    let quiet = tokio::time::timeout(Duration::from_millis(200), detector.wait_for_change()).await;
    assert!(quiet.is_err());
    Ok(())
}

#[tokio::test]
async fn notify_detector_reports_a_source_edit() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let rule = WatchRule::new(&root, &["vendor".to_string()], false, "go")?;
    let mut detector = NotifyDetector::spawn(rule, INTERVAL)?;
    settle().await;

    write(&root, "vendor/x.go", "package x");
    write(&root, "main.go", "package main");

    let changed = with_timeout(detector.wait_for_change()).await?;
    assert_eq!(changed, root.join("main.go"));
    Ok(())
}

#[tokio::test]
async fn rebuilt_artifact_in_the_tree_does_not_retrigger() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "main.go", "package main");

    let cli = GlobalArgs {
        path: Some(dir.path().to_string_lossy().into_owned()),
        bin: Some("app".into()),
        all: true,
        ..GlobalArgs::default()
    };
    let settings = Settings::try_from(merge(&cli, None, dir.path().to_path_buf(), false))?;
    let rule = settings.watch_rule()?;
    let mut detector =
        PollingDetector::new(Arc::new(RealFileSystem), rule, ScanCursor::now(), INTERVAL)?;
    settle().await;

    write(dir.path(), "main.go", "package main // edited");
    let changed = with_timeout(detector.wait_for_change()).await?;
    assert_eq!(changed, dir.path().join("main.go"));

    // What the rebuild writes after the trigger.
    write(dir.path(), "app", "binary");
    let quiet = tokio::time::timeout(Duration::from_millis(200), detector.wait_for_change()).await;
    assert!(quiet.is_err(), "the build output must not trigger another build");

    write(dir.path(), "notes.txt", "still watching everything else");
    let changed = with_timeout(detector.wait_for_change()).await?;
    assert_eq!(changed, dir.path().join("notes.txt"));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directories_are_not_followed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let outside = tempfile::tempdir()?;
    let rule = WatchRule::new(dir.path(), &[], true, "go")?;
    let mut detector =
        PollingDetector::new(Arc::new(RealFileSystem), rule, ScanCursor::now(), INTERVAL)?;
    settle().await;

    write(outside.path(), "shared/lib.go", "package shared");
    std::os::unix::fs::symlink(outside.path().join("shared"), dir.path().join("shared"))?;

    let quiet = tokio::time::timeout(Duration::from_millis(200), detector.wait_for_change()).await;
    assert!(quiet.is_err(), "nothing behind a symlinked dir may trigger");
    Ok(())
}
