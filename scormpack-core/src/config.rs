//! Pipeline Configuration
//!
//! Locations are supplied by the caller, never derived from where the
//! binary lives. A config file looks like:
//!
//! ```toml
//! template_root = "templates"
//! output_root = "output"
//! scratch_root = "temp"
//! default_content_dir = "content"   # optional
//!
//! [retention]
//! max_age_hours = 24
//! max_count = 10
//! ```
//!
//! Relative paths in a file are resolved against the file's directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::retention::{RetentionManager, RetentionPolicy};
use crate::templates::TemplateLayout;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub template_root: PathBuf,
    pub output_root: PathBuf,
    pub scratch_root: PathBuf,
    #[serde(default)]
    pub default_content_dir: Option<PathBuf>,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl PipelineConfig {
    pub fn new(
        template_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            template_root: template_root.into(),
            output_root: output_root.into(),
            scratch_root: scratch_root.into(),
            default_content_dir: None,
            retention: RetentionPolicy::default(),
        }
    }

    pub fn with_default_content_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_content_dir = Some(dir.into());
        self
    }

    pub fn with_retention(mut self, policy: RetentionPolicy) -> Self {
        self.retention = policy;
        self
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config = Self::from_toml(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.relative_to(base))
    }

    /// Parse TOML text; relative paths are kept as written.
    pub fn from_toml(text: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), PipelineError> {
        if !self.retention.max_age_hours.is_finite() || self.retention.max_age_hours < 0.0 {
            return Err(PipelineError::Config(format!(
                "retention.max_age_hours must be a non-negative number, got {}",
                self.retention.max_age_hours
            )));
        }
        Ok(())
    }

    fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.template_root);
        resolve(&mut self.output_root);
        resolve(&mut self.scratch_root);
        if let Some(dir) = self.default_content_dir.as_mut() {
            resolve(dir);
        }
        self
    }

    pub fn templates(&self) -> TemplateLayout {
        TemplateLayout::new(&self.template_root)
    }

    pub fn retention_manager(&self) -> RetentionManager {
        RetentionManager::new(&self.output_root, &self.scratch_root, self.retention)
    }
}
