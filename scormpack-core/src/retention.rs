//! Retention Manager - Bounded Artifact Lifetime
//!
//! Two independent sweeps: age/count eviction over archives in the output
//! directory (plus staging files abandoned past the age limit), and a purge
//! of the scratch root. Both are stateless, safe on
//! an empty or missing directory, and never fail the caller; problems are
//! logged and counted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::archive::{ARCHIVE_EXTENSION, STAGING_SUFFIX};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: f64,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

fn default_max_age_hours() -> f64 { 24.0 }
fn default_max_count() -> usize { 10 }

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
            max_count: default_max_count(),
        }
    }
}

impl RetentionPolicy {
    /// Rank is 0 for the newest file. Either condition alone evicts.
    pub fn should_evict(&self, age: Duration, rank: usize) -> bool {
        hours(age) > self.max_age_hours || rank >= self.max_count
    }
}

fn hours(d: Duration) -> f64 {
    d.as_secs_f64() / 3600.0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub removed: usize,
    pub retained: usize,
    /// Deletions that failed. Failed archives are counted as retained too.
    pub failed: usize,
    /// Abandoned staging files past the age limit.
    pub staging_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub removed: bool,
}

#[derive(Debug, Clone)]
struct ArchiveFile {
    path: PathBuf,
    modified: SystemTime,
}

pub struct RetentionManager {
    output_root: PathBuf,
    scratch_root: PathBuf,
    policy: RetentionPolicy,
}

impl RetentionManager {
    pub fn new(output_root: impl Into<PathBuf>, scratch_root: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            output_root: output_root.into(),
            scratch_root: scratch_root.into(),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Evict archives older than the age limit or ranked past the count limit.
    pub fn sweep_archives(&self) -> SweepSummary {
        self.sweep_archives_at(SystemTime::now())
    }

    /// Sweep with an explicit clock, evaluated once for the whole sweep.
    pub fn sweep_archives_at(&self, now: SystemTime) -> SweepSummary {
        self.sweep_with(now, |path| fs::remove_file(path))
    }

    fn sweep_with(&self, now: SystemTime, remove: impl Fn(&Path) -> io::Result<()>) -> SweepSummary {
        let Listing { archives: mut files, staging } = match list_output(&self.output_root) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(dir = %self.output_root.display(), "output directory does not exist, nothing to sweep");
                return SweepSummary::default();
            }
            Err(e) => {
                warn!(dir = %self.output_root.display(), error = %e, "failed to list output directory");
                return SweepSummary::default();
            }
        };

        // Newest first.
        files.sort_by(|a, b| b.modified.cmp(&a.modified));

        let mut summary = SweepSummary::default();
        for (rank, file) in files.iter().enumerate() {
            // Files stamped in the future count as brand new.
            let age = now.duration_since(file.modified).unwrap_or_default();
            if !self.policy.should_evict(age, rank) {
                summary.retained += 1;
                continue;
            }
            match remove(&file.path) {
                Ok(()) => {
                    summary.removed += 1;
                    info!(file = %file.path.display(), age_hours = hours(age), rank, "removed archive");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => summary.removed += 1,
                Err(e) => {
                    summary.failed += 1;
                    summary.retained += 1;
                    warn!(file = %file.path.display(), error = %e, "failed to remove archive");
                }
            }
        }

        for file in &staging {
            let age = now.duration_since(file.modified).unwrap_or_default();
            if hours(age) <= self.policy.max_age_hours {
                continue;
            }
            match remove(&file.path) {
                Ok(()) => {
                    summary.staging_removed += 1;
                    info!(file = %file.path.display(), age_hours = hours(age), "removed abandoned staging file");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    summary.failed += 1;
                    warn!(file = %file.path.display(), error = %e, "failed to remove staging file");
                }
            }
        }

        if summary.removed > 0 {
            info!(removed = summary.removed, retained = summary.retained, "archive sweep complete");
        } else {
            info!(total = files.len(), "archive sweep: all files within limits");
        }
        summary
    }

    /// Remove the whole scratch root. A missing root is not an error.
    pub fn purge_working_root(&self) -> PurgeSummary {
        match fs::remove_dir_all(&self.scratch_root) {
            Ok(()) => {
                info!(dir = %self.scratch_root.display(), "purged working area");
                PurgeSummary { removed: true }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => PurgeSummary { removed: false },
            Err(e) => {
                warn!(dir = %self.scratch_root.display(), error = %e, "failed to purge working area");
                PurgeSummary { removed: false }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Listing {
    archives: Vec<ArchiveFile>,
    staging: Vec<ArchiveFile>,
}

fn is_staging(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

fn list_output(dir: &Path) -> io::Result<Listing> {
    let mut listing = Listing::default();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let staging = is_staging(&entry.file_name().to_string_lossy());
        let is_archive = path
            .extension()
            .map_or(false, |ext| ext == ARCHIVE_EXTENSION);
        if !staging && !is_archive {
            continue;
        }
        // Entries can vanish between listing and stat under a concurrent sweep.
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        let file = ArchiveFile {
            path,
            modified: metadata.modified()?,
        };
        if staging {
            listing.staging.push(file);
        } else {
            listing.archives.push(file);
        }
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_either_condition_evicts() {
        let policy = RetentionPolicy { max_age_hours: 24.0, max_count: 3 };
        assert!(!policy.should_evict(HOUR, 0));
        assert!(policy.should_evict(25 * HOUR, 0));
        assert!(policy.should_evict(HOUR, 3));
        assert!(!policy.should_evict(24 * HOUR, 2));
    }

    fn aged(dir: &Path, name: &str, now: SystemTime, age: Duration) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"PK").unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(now - age)
            .unwrap();
        path
    }

    #[test]
    fn test_failed_delete_does_not_stop_sweep() {
        let dir = tempfile::TempDir::new().unwrap();
        let now = SystemTime::now();
        let stuck = aged(dir.path(), "stuck.zip", now, 30 * HOUR);
        aged(dir.path(), "old.zip", now, 40 * HOUR);
        aged(dir.path(), "fresh.zip", now, HOUR);

        let manager = RetentionManager::new(dir.path(), dir.path(), RetentionPolicy::default());
        let summary = manager.sweep_with(now, |path| {
            if path == stuck.as_path() {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            } else {
                fs::remove_file(path)
            }
        });

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retained, 2);
        assert!(stuck.exists());
        assert!(!dir.path().join("old.zip").exists());
        assert!(dir.path().join("fresh.zip").exists());
    }

    #[test]
    fn test_staging_names() {
        assert!(is_staging(".tmpAb12cd.zip.partial"));
        assert!(!is_staging("course.zip"));
        assert!(!is_staging("visible.zip.partial"));
    }

    #[test]
    fn test_missing_directories_are_noops() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = RetentionManager::new(
            dir.path().join("no-output"),
            dir.path().join("no-scratch"),
            RetentionPolicy::default(),
        );
        assert_eq!(manager.sweep_archives(), SweepSummary::default());
        assert_eq!(manager.purge_working_root(), PurgeSummary { removed: false });
    }
}
