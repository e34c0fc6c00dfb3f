//! Package Archiver - Collision-Free Zip Output
//!
//! Archives are written to a hidden temp file in the output directory and
//! only renamed to their final name once the zip is finished and synced, so
//! a path returned from here always names a complete archive.

use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PipelineError;
use crate::sanitize::{sanitize_first, DEFAULT_PACKAGE_NAME};
use crate::spec::BuildSpec;

pub const ARCHIVE_EXTENSION: &str = "zip";

/// Hidden in-progress archives are named `.<random><STAGING_SUFFIX>`.
pub const STAGING_SUFFIX: &str = ".zip.partial";

/// `<base>_<YYYY-MM-DD_HH-MM-SS-mmm>_<nonce>.zip`
///
/// The timestamp keeps names sortable; the nonce separates builds that
/// land in the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    base: String,
    timestamp: String,
    nonce: String,
}

impl ArchiveName {
    pub fn new(base: String, at: DateTime<Utc>) -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        Self {
            base,
            timestamp: at.format("%Y-%m-%d_%H-%M-%S-%3f").to_string(),
            nonce: nonce[..8].to_string(),
        }
    }

    /// Base from identifier, then title, then the generic default.
    pub fn for_spec(spec: &BuildSpec, at: DateTime<Utc>) -> Self {
        let base = sanitize_first([spec.identifier.as_str(), spec.title.as_str()], DEFAULT_PACKAGE_NAME);
        Self::new(base, at)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn filename(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}.{}", self.base, self.timestamp, self.nonce, ARCHIVE_EXTENSION)
    }
}

pub struct PackageArchiver;

impl PackageArchiver {
    /// Compress `work_dir` into `output_dir/<name>`. Entry paths are relative
    /// to `work_dir`, with no wrapping folder.
    pub fn archive(work_dir: &Path, output_dir: &Path, name: &ArchiveName) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(output_dir).map_err(|e| PipelineError::io(output_dir, e))?;
        let final_path = output_dir.join(name.filename());

        let staging = tempfile::Builder::new()
            .prefix(".")
            .suffix(STAGING_SUFFIX)
            .tempfile_in(output_dir)
            .map_err(|e| PipelineError::archive_write(&final_path, e))?;

        let mut writer = ZipWriter::new(staging);
        let entries = write_tree(&mut writer, work_dir).map_err(|e| PipelineError::archive_write(&final_path, e))?;
        let staging = writer.finish().map_err(|e| PipelineError::archive_write(&final_path, e))?;
        staging
            .as_file()
            .sync_all()
            .map_err(|e| PipelineError::archive_write(&final_path, e))?;

        // Dropping `staging` on any earlier error removes the partial file.
        staging
            .persist_noclobber(&final_path)
            .map_err(|e| PipelineError::archive_write(&final_path, e.error))?;

        info!(path = %final_path.display(), entries, "wrote archive");
        Ok(final_path)
    }
}

fn write_tree<W: io::Write + io::Seek>(writer: &mut ZipWriter<W>, root: &Path) -> zip::result::ZipResult<usize> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));
    let mut entries = 0;

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), options)?;
        } else {
            writer.start_file(name.as_str(), options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, writer)?;
            debug!(entry = %name, "archived");
        }
        entries += 1;
    }

    Ok(entries)
}
