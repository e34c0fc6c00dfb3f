//! Uploaded Content - Scoped Extraction Of A Zip Bundle

use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::PipelineError;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// An uploaded bundle extracted under the scratch root. Removed on drop.
#[derive(Debug)]
pub struct ExtractedUpload {
    path: PathBuf,
}

impl ExtractedUpload {
    pub fn extract(archive: &Path, scratch_root: &Path) -> Result<Self, PipelineError> {
        let is_zip = archive
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"));
        if !is_zip {
            return Err(PipelineError::InvalidUpload(format!(
                "uploaded content must be a .zip: {}",
                archive.display()
            )));
        }

        let file = File::open(archive)
            .map_err(|e| PipelineError::InvalidUpload(format!("{}: {e}", archive.display())))?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| PipelineError::InvalidUpload(format!("{}: {e}", archive.display())))?;

        reject_symlinks(&mut zip, archive)?;

        let path = scratch_root.join(format!("upload-{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        // Construct the guard first so a failed extraction still cleans up.
        let upload = Self { path };

        zip.extract(&upload.path)
            .map_err(|e| PipelineError::InvalidUpload(format!("{}: {e}", archive.display())))?;
        debug!(source = %archive.display(), path = %upload.path.display(), "extracted upload");
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Link entries would be recreated as real links pointing outside the bundle.
fn reject_symlinks<R: Read + Seek>(zip: &mut ZipArchive<R>, archive: &Path) -> Result<(), PipelineError> {
    for i in 0..zip.len() {
        let entry = zip
            .by_index_raw(i)
            .map_err(|e| PipelineError::InvalidUpload(format!("{}: {e}", archive.display())))?;
        let is_link = entry
            .unix_mode()
            .map_or(false, |mode| mode & S_IFMT == S_IFLNK);
        if is_link {
            return Err(PipelineError::InvalidUpload(format!(
                "{}: symbolic link entries are not allowed ({})",
                archive.display(),
                entry.name()
            )));
        }
    }
    Ok(())
}

impl Drop for ExtractedUpload {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove extracted upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn bundle(dir: &Path) -> PathBuf {
        let path = dir.join("content.ZIP");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("lesson/page.html", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<p>hi</p>").unwrap();
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_extracts_and_releases() {
        let dir = TempDir::new().unwrap();
        let archive = bundle(dir.path());

        let upload = ExtractedUpload::extract(&archive, dir.path()).unwrap();
        let extracted = upload.path().to_path_buf();
        assert_eq!(fs::read_to_string(extracted.join("lesson/page.html")).unwrap(), "<p>hi</p>");

        drop(upload);
        assert!(!extracted.exists());
    }

    #[test]
    fn test_rejects_symlink_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linked.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("index.html", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<p>hi</p>").unwrap();
        zip.add_symlink("passwd", "/etc/passwd", SimpleFileOptions::default()).unwrap();
        zip.finish().unwrap();

        let scratch = dir.path().join("scratch");
        let err = ExtractedUpload::extract(&path, &scratch).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidUpload(_)));
        assert!(err.to_string().contains("passwd"));
        // Rejected before anything is extracted.
        assert!(!scratch.exists());
    }

    #[test]
    fn test_rejects_non_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("content.tar");
        fs::write(&path, "x").unwrap();
        assert!(matches!(
            ExtractedUpload::extract(&path, dir.path()),
            Err(PipelineError::InvalidUpload(_))
        ));

        let fake = dir.path().join("fake.zip");
        fs::write(&fake, "not a zip").unwrap();
        assert!(matches!(
            ExtractedUpload::extract(&fake, dir.path()),
            Err(PipelineError::InvalidUpload(_))
        ));
    }
}
