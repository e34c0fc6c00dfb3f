//! Working Directory - Scoped Scratch Area For One Build
//!
//! Acquiring clears the path; dropping the guard removes it unless the
//! directory was kept as the build's artifact.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::PipelineError;

#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    release_on_drop: bool,
}

impl WorkingDirectory {
    /// Create `path` empty. Existing contents are removed, not overwritten.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        }
        fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        debug!(path = %path.display(), "acquired working directory");

        Ok(Self {
            path,
            release_on_drop: true,
        })
    }

    /// A fresh, uniquely named directory under `scratch_root`.
    pub fn unique_in(scratch_root: &Path) -> Result<Self, PipelineError> {
        Self::acquire(scratch_root.join(format!("work-{}", Uuid::new_v4().simple())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm cleanup; the directory outlives the guard.
    pub fn keep(mut self) -> PathBuf {
        self.release_on_drop = false;
        self.path.clone()
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if !self.release_on_drop {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released working directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to release working directory"),
        }
    }
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Symbolic links are refused: copying one would pull its target, which
/// may live anywhere on the host, into the package.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<u64, PipelineError> {
    let mut copied = 0;
    fs::create_dir_all(dst).map_err(|e| PipelineError::io(dst, e))?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PipelineError::io(&path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PipelineError::io(entry.path(), std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
        let target = dst.join(rel);

        if entry.path_is_symlink() {
            return Err(PipelineError::io(
                entry.path(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "symbolic links are not copied"),
            ));
        }
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| PipelineError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| PipelineError::io(entry.path(), e))?;
            copied += 1;
        }
    }

    Ok(copied)
}
