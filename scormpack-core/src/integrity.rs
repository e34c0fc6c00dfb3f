//! Integrity Check - Nothing Referenced May Be Missing
//!
//! Runs after content and manifest generation, before packaging. Every
//! missing path is collected; the check never stops at the first one.

use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::PipelineError;
use crate::spec::BuildSpec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingPath {
    /// Reference as declared in the build spec.
    pub declared: String,
    /// Path actually probed.
    pub probed: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub missing_entry: Option<MissingPath>,
    pub missing_resources: Vec<MissingPath>,
}

impl IntegrityReport {
    pub fn is_complete(&self) -> bool {
        self.missing_entry.is_none() && self.missing_resources.is_empty()
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![];
        if let Some(entry) = &self.missing_entry {
            parts.push(format!(
                "launch file missing: {} (looked for {})",
                entry.declared,
                entry.probed.display()
            ));
        }
        for res in &self.missing_resources {
            parts.push(format!(
                "SCO href not found: {} (resolved {})",
                res.declared,
                res.probed.display()
            ));
        }
        f.write_str(&parts.join("; "))
    }
}

pub struct IntegrityChecker;

impl IntegrityChecker {
    pub fn inspect(spec: &BuildSpec, work_dir: &Path) -> IntegrityReport {
        let missing_entry = probe(work_dir, &spec.launch);
        let missing_resources = spec
            .sco
            .iter()
            .filter_map(|sco| probe(work_dir, &sco.href))
            .collect();

        IntegrityReport {
            missing_entry,
            missing_resources,
        }
    }

    /// Pass, or `IncompleteArtifact` naming every missing path.
    pub fn verify(spec: &BuildSpec, work_dir: &Path) -> Result<(), PipelineError> {
        let report = Self::inspect(spec, work_dir);
        if report.is_complete() {
            Ok(())
        } else {
            Err(PipelineError::IncompleteArtifact(report))
        }
    }
}

/// A reference escaping the working directory counts as missing.
fn probe(work_dir: &Path, declared: &str) -> Option<MissingPath> {
    let rel = Path::new(declared);
    let probed = work_dir.join(rel);
    let contained = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if contained && probed.is_file() {
        None
    } else {
        Some(MissingPath {
            declared: declared.to_string(),
            probed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn spec_with_scos(hrefs: &[&str]) -> BuildSpec {
        let sco: Vec<_> = hrefs.iter().map(|h| json!({ "href": h })).collect();
        serde_json::from_value(json!({
            "identifier": "pkg", "title": "Pkg", "objectType": "passthrough", "sco": sco
        }))
        .unwrap()
    }

    #[test]
    fn test_complete_directory_passes() {
        let work = TempDir::new().unwrap();
        fs::create_dir_all(work.path().join("content")).unwrap();
        fs::write(work.path().join("index.html"), "x").unwrap();
        fs::write(work.path().join("content/a.html"), "a").unwrap();

        assert!(IntegrityChecker::verify(&spec_with_scos(&["content/a.html"]), work.path()).is_ok());
    }

    #[test]
    fn test_reports_every_missing_path() {
        let work = TempDir::new().unwrap();
        fs::create_dir_all(work.path().join("content")).unwrap();
        fs::write(work.path().join("content/b.html"), "b").unwrap();

        let spec = spec_with_scos(&["content/a.html", "content/b.html", "content/c.html", "../x.html"]);
        let report = IntegrityChecker::inspect(&spec, work.path());

        assert_eq!(report.missing_entry.as_ref().unwrap().declared, "index.html");
        let declared: Vec<_> = report.missing_resources.iter().map(|m| m.declared.as_str()).collect();
        assert_eq!(declared, vec!["content/a.html", "content/c.html", "../x.html"]);
        assert_eq!(report.missing_resources[0].probed, work.path().join("content/a.html"));

        let message = PipelineError::IncompleteArtifact(report).to_string();
        assert!(message.contains("content/a.html"));
        assert!(message.contains("content/c.html"));
    }
}
