//! Manifest Renderer - Package Descriptor For Every Object Type

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PipelineError;
use crate::render::{render, RenderVars};
use crate::spec::BuildSpec;
use crate::templates::TemplateLayout;

/// Well-known manifest file name at the package root.
pub const MANIFEST_FILE: &str = "imsmanifest.xml";

pub struct ManifestRenderer;

impl ManifestRenderer {
    /// Render the dialect's manifest template into `work_dir/imsmanifest.xml`.
    pub fn write(
        spec: &BuildSpec,
        templates: &TemplateLayout,
        vars: &RenderVars,
        work_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let dialect = spec.dialect();
        let template = templates.load_manifest(dialect)?;
        let xml = render(&template, vars)?;

        let path = work_dir.join(MANIFEST_FILE);
        fs::write(&path, xml).map_err(|e| PipelineError::io(&path, e))?;
        debug!(%dialect, path = %path.display(), "wrote manifest");
        Ok(path)
    }
}
