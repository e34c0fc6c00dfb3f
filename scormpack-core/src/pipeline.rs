//! Build Pipeline - Single Entry Point
//!
//! CRITICAL: build MUST validate its input internally. No bypass.
//!
//! Steps, in order: working directory, content, manifest, integrity,
//! export snapshot, archive. Any failure releases the working directory
//! and leaves nothing in the output directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::archive::{ArchiveName, PackageArchiver};
use crate::config::PipelineConfig;
use crate::content::{ContentGenerator, MaterializeContext};
use crate::error::PipelineError;
use crate::export::ExportEmitter;
use crate::hashing::{compute_spec_hash, sha256_file};
use crate::integrity::IntegrityChecker;
use crate::manifest::ManifestRenderer;
use crate::normalize::{RawInput, SpecNormalizer};
use crate::render::RenderVars;
use crate::spec::BuildSpec;
use crate::upload::ExtractedUpload;
use crate::validation::{ValidationResult, Validator};
use crate::workspace::WorkingDirectory;
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Compress into the output directory. When false the working directory is the artifact.
    #[serde(default = "default_archive")]
    pub archive: bool,
    /// Keep the working directory after a successful archive.
    #[serde(default)]
    pub keep_working_dir: bool,
    /// Explicit working directory; a unique one under the scratch root otherwise.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_archive() -> bool { true }

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            archive: true,
            keep_working_dir: false,
            work_dir: None,
        }
    }
}

impl BuildOptions {
    pub fn archived() -> Self {
        Self::default()
    }

    pub fn directory_only() -> Self {
        Self {
            archive: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub build_id: String,
    pub identifier: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    /// Manifest dialect tag, `scorm12` or `scorm2004`.
    pub scorm_version: String,
    /// Archive path, or the working directory when not archived.
    pub output_path: PathBuf,
    /// Present only when the working directory outlived the build.
    pub working_dir: Option<PathBuf>,
    pub archived: bool,
    pub spec_hash: String,
    pub archive_sha256: Option<String>,
    pub export_file: Option<String>,
}

/// The build pipeline - single entry point for all package builds
pub struct BuildPipeline {
    config: PipelineConfig,
    normalizer: SpecNormalizer,
    validator: Validator,
    generator: ContentGenerator,
}

impl BuildPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            normalizer: SpecNormalizer::new(),
            validator: Validator::new(),
            generator: ContentGenerator::new(),
        }
    }

    /// Replace the strategy registry.
    pub fn with_generator(mut self, generator: ContentGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Schema-check raw input without building anything.
    pub fn validate(&self, input: &RawInput) -> Result<ValidationResult, PipelineError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        self.normalizer.check(input)
    }

    /// Normalize raw input, attach an uploaded bundle if given, and build.
    ///
    /// Input is rejected before any filesystem work. The extracted upload is
    /// released on every exit path.
    pub fn handle(
        &self,
        input: &RawInput,
        upload: Option<&Path>,
        options: &BuildOptions,
    ) -> Result<BuildArtifact, PipelineError> {
        let spec = self.normalizer.normalize(input)?;

        let extracted = match upload {
            Some(archive) => Some(ExtractedUpload::extract(archive, &self.config.scratch_root)?),
            None => None,
        };
        let spec = match &extracted {
            Some(upload) => spec.with_content_source(upload.path()),
            None => spec,
        };

        self.build(&spec, options)
    }

    /// Build a package from a normalized spec.
    ///
    /// CRITICAL: This ALWAYS re-validates. No bypass possible.
    pub fn build(&self, spec: &BuildSpec, options: &BuildOptions) -> Result<BuildArtifact, PipelineError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        // MANDATORY: a hand-built BuildSpec goes through the same rules as raw input.
        self.validator.validate(&serde_json::to_value(spec)?).into_result()?;

        let build_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let spec_hash = compute_spec_hash(spec, ENGINE_VERSION)?;
        info!(
            %build_id,
            identifier = %spec.identifier,
            object_type = %spec.object_type(),
            dialect = %spec.dialect(),
            %spec_hash,
            "build started"
        );

        let work = match &options.work_dir {
            Some(dir) => WorkingDirectory::acquire(dir)?,
            None => WorkingDirectory::unique_in(&self.config.scratch_root)?,
        };

        let templates = self.config.templates();
        let vars = RenderVars::for_spec(spec)?;
        let ctx = MaterializeContext {
            spec,
            templates: &templates,
            vars: &vars,
            work_dir: work.path(),
            default_content_dir: self.config.default_content_dir.as_deref(),
        };

        self.generator.generate(&ctx)?;
        debug!("content generated");

        ManifestRenderer::write(spec, &templates, &vars, work.path())?;

        IntegrityChecker::verify(spec, work.path()).map_err(|e| {
            warn!(%build_id, error = %e, "integrity check failed");
            e
        })?;

        let export_file = ExportEmitter::emit(spec, work.path())?
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));

        let mut artifact = BuildArtifact {
            build_id,
            identifier: spec.identifier.clone(),
            created_at,
            engine_version: ENGINE_VERSION.to_string(),
            scorm_version: spec.dialect().tag().to_string(),
            output_path: PathBuf::new(),
            working_dir: None,
            archived: options.archive,
            spec_hash,
            archive_sha256: None,
            export_file,
        };

        if options.archive {
            let name = ArchiveName::for_spec(spec, created_at);
            let path = PackageArchiver::archive(work.path(), &self.config.output_root, &name)?;
            let digest = match sha256_file(&path) {
                Ok(digest) => digest,
                Err(e) => {
                    // An archive we cannot fingerprint is not reported as built.
                    let _ = std::fs::remove_file(&path);
                    return Err(PipelineError::io(&path, e));
                }
            };
            artifact.archive_sha256 = Some(digest);
            artifact.output_path = path;
            if options.keep_working_dir {
                artifact.working_dir = Some(work.keep());
            }
        } else {
            let dir = work.keep();
            artifact.output_path = dir.clone();
            artifact.working_dir = Some(dir);
        }

        info!(
            build_id = %artifact.build_id,
            output = %artifact.output_path.display(),
            archived = artifact.archived,
            "build finished"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn passthrough_setup(root: &Path) -> PipelineConfig {
        let templates = root.join("templates/scorm12");
        fs::create_dir_all(&templates).unwrap();
        fs::write(
            templates.join("imsmanifest.xml.tera"),
            r#"<manifest identifier="{{ identifier }}"><resource href="{{ launch }}"/></manifest>"#,
        )
        .unwrap();
        fs::write(templates.join("launch.html.tera"), "<a href=\"{{ content_dir }}/index.html\">{{ title }}</a>").unwrap();

        let content = root.join("content");
        fs::create_dir_all(&content).unwrap();
        fs::write(content.join("index.html"), "<p>course</p>").unwrap();

        PipelineConfig::new(root.join("templates"), root.join("output"), root.join("temp"))
            .with_default_content_dir(content)
    }

    fn passthrough_spec() -> BuildSpec {
        serde_json::from_value(json!({
            "identifier": "intro", "title": "Intro", "objectType": "passthrough",
            "sco": [{"href": "content/index.html"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_build_reports_dialect_and_digest() {
        let root = TempDir::new().unwrap();
        let pipeline = BuildPipeline::new(passthrough_setup(root.path()));

        let artifact = pipeline.build(&passthrough_spec(), &BuildOptions::archived()).unwrap();
        assert!(artifact.archived);
        assert_eq!(artifact.scorm_version, "scorm12");
        assert!(artifact.output_path.starts_with(root.path().join("output")));
        assert_eq!(artifact.archive_sha256.as_deref().map(str::len), Some(64));
        assert!(artifact.working_dir.is_none());
        assert!(artifact.export_file.is_none());

        // Working directory released after archiving.
        let leftover = fs::read_dir(root.path().join("temp")).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_directory_only_build_keeps_tree() {
        let root = TempDir::new().unwrap();
        let pipeline = BuildPipeline::new(passthrough_setup(root.path()));

        let artifact = pipeline.build(&passthrough_spec(), &BuildOptions::directory_only()).unwrap();
        assert!(!artifact.archived);
        assert!(artifact.archive_sha256.is_none());
        assert!(artifact.output_path.join("imsmanifest.xml").is_file());
        assert!(artifact.output_path.join("content/index.html").is_file());
        assert!(!root.path().join("output").exists());
    }

    #[test]
    fn test_build_revalidates_hand_built_spec() {
        let root = TempDir::new().unwrap();
        let pipeline = BuildPipeline::new(passthrough_setup(root.path()));

        let mut spec = passthrough_spec();
        spec.launch = "../outside.html".into();
        let err = pipeline.build(&spec, &BuildOptions::archived()).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation(_)));
        assert!(!root.path().join("temp").exists());
    }

    #[test]
    fn test_failed_build_leaves_no_output() {
        let root = TempDir::new().unwrap();
        let pipeline = BuildPipeline::new(passthrough_setup(root.path()));

        let mut spec = passthrough_spec();
        spec.sco.push(serde_json::from_value(json!({"href": "content/missing.html"})).unwrap());
        let err = pipeline.build(&spec, &BuildOptions::archived()).unwrap_err();
        assert!(matches!(err, PipelineError::IncompleteArtifact(_)));
        assert!(!root.path().join("output").exists());
        assert_eq!(fs::read_dir(root.path().join("temp")).unwrap().count(), 0);
    }
}
