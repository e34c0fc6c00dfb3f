//! Retention Sweep Tests
//!
//! File ages are set explicitly; the sweep clock is passed in.

use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use scormpack_core::{RetentionManager, RetentionPolicy, SweepSummary};

const HOUR: Duration = Duration::from_secs(3600);

fn archive_aged(dir: &Path, name: &str, now: SystemTime, age: Duration) {
    let path = dir.join(name);
    fs::write(&path, b"PK").unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(now - age)
        .unwrap();
}

fn remaining(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn manager(output: &Path, scratch: &Path, max_age_hours: f64, max_count: usize) -> RetentionManager {
    RetentionManager::new(output, scratch, RetentionPolicy { max_age_hours, max_count })
}

#[test]
fn invariant_old_archives_removed_by_age() {
    let out = TempDir::new().unwrap();
    let now = SystemTime::now();
    archive_aged(out.path(), "fresh.zip", now, HOUR);
    archive_aged(out.path(), "stale.zip", now, 25 * HOUR);

    let summary = manager(out.path(), out.path(), 24.0, 10).sweep_archives_at(now);
    assert_eq!(summary, SweepSummary { removed: 1, retained: 1, ..SweepSummary::default() });
    assert_eq!(remaining(out.path()), vec!["fresh.zip"]);
}

#[test]
fn invariant_count_limit_keeps_newest() {
    let out = TempDir::new().unwrap();
    let now = SystemTime::now();
    for i in 0..5u32 {
        archive_aged(out.path(), &format!("build-{i}.zip"), now, i * HOUR);
    }

    let summary = manager(out.path(), out.path(), 24.0, 3).sweep_archives_at(now);
    assert_eq!(summary.removed, 2);
    assert_eq!(summary.retained, 3);
    assert_eq!(remaining(out.path()), vec!["build-0.zip", "build-1.zip", "build-2.zip"]);
}

#[test]
fn invariant_either_rule_alone_evicts() {
    let out = TempDir::new().unwrap();
    let now = SystemTime::now();
    // Rank 0 but too old; rank 1 young but past the count.
    archive_aged(out.path(), "old.zip", now, 30 * HOUR);
    archive_aged(out.path(), "older.zip", now, 40 * HOUR);

    let summary = manager(out.path(), out.path(), 24.0, 1).sweep_archives_at(now);
    assert_eq!(summary.removed, 2);
    assert!(remaining(out.path()).is_empty());
}

#[test]
fn invariant_only_archives_are_considered() {
    let out = TempDir::new().unwrap();
    let now = SystemTime::now();
    archive_aged(out.path(), "ancient.zip", now, 100 * HOUR);
    archive_aged(out.path(), "notes.txt", now, 100 * HOUR);
    fs::create_dir(out.path().join("folder.zip")).unwrap();

    let summary = manager(out.path(), out.path(), 24.0, 10).sweep_archives_at(now);
    assert_eq!(summary.removed, 1);
    assert_eq!(remaining(out.path()), vec!["folder.zip", "notes.txt"]);
}

#[test]
fn invariant_empty_directory_is_noop() {
    let out = TempDir::new().unwrap();
    let summary = manager(out.path(), out.path(), 24.0, 10).sweep_archives();
    assert_eq!(summary, SweepSummary::default());
}

#[test]
fn invariant_sweeps_are_stateless() {
    let out = TempDir::new().unwrap();
    let now = SystemTime::now();
    archive_aged(out.path(), "a.zip", now, 20 * HOUR);
    let sweeper = manager(out.path(), out.path(), 24.0, 10);

    assert_eq!(sweeper.sweep_archives_at(now).retained, 1);
    // Same file, later clock: now past the age limit.
    assert_eq!(sweeper.sweep_archives_at(now + 5 * HOUR).removed, 1);
}

#[test]
fn invariant_abandoned_staging_files_reclaimed_by_age() {
    let out = TempDir::new().unwrap();
    let now = SystemTime::now();
    archive_aged(out.path(), ".tmpOld123.zip.partial", now, 30 * HOUR);
    archive_aged(out.path(), ".tmpNew456.zip.partial", now, HOUR);
    archive_aged(out.path(), "kept.zip", now, HOUR);

    // Staging files are never ranked; only age removes them.
    let summary = manager(out.path(), out.path(), 24.0, 10).sweep_archives_at(now);
    assert_eq!(summary.staging_removed, 1);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.retained, 1);
    assert_eq!(remaining(out.path()), vec![".tmpNew456.zip.partial", "kept.zip"]);
}

#[test]
fn invariant_purge_removes_scratch_root() {
    let scratch = TempDir::new().unwrap();
    let root = scratch.path().join("temp");
    fs::create_dir_all(root.join("work-1/scripts")).unwrap();
    fs::write(root.join("work-1/scripts/app.js"), "x").unwrap();
    fs::create_dir_all(root.join("upload-2")).unwrap();

    let sweeper = manager(scratch.path(), &root, 24.0, 10);
    assert!(sweeper.purge_working_root().removed);
    assert!(!root.exists());

    // Second purge finds nothing and does not fail.
    assert!(!sweeper.purge_working_root().removed);
}
