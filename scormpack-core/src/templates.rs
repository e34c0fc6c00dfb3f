//! Template Layout - Caller-Supplied Templates Area
//!
//! ```text
//! <root>/<dialect>/imsmanifest.xml.tera    manifest per dialect
//! <root>/<dialect>/launch.html.tera        passthrough launch page
//! <root>/<dialect>/static/                 optional runtime shims
//! <root>/<object-type>/index.html.tera     entry page per object type
//! <root>/<object-type>/static/             verbatim supporting assets
//! ```
//!
//! Templates are re-read on every build.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::spec::{ManifestDialect, ObjectType};

pub const MANIFEST_TEMPLATE: &str = "imsmanifest.xml.tera";
pub const LAUNCH_TEMPLATE: &str = "launch.html.tera";
pub const ENTRY_TEMPLATE: &str = "index.html.tera";
pub const STATIC_DIR: &str = "static";

/// A template source together with the path it was read from.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub text: String,
}

impl TemplateSource {
    /// Name used in render errors and logs.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct TemplateLayout {
    root: PathBuf,
}

impl TemplateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self, dialect: ManifestDialect) -> PathBuf {
        self.root.join(dialect.tag()).join(MANIFEST_TEMPLATE)
    }

    pub fn launch_path(&self, dialect: ManifestDialect) -> PathBuf {
        self.root.join(dialect.tag()).join(LAUNCH_TEMPLATE)
    }

    pub fn entry_path(&self, object_type: ObjectType) -> PathBuf {
        self.root.join(object_type.as_str()).join(ENTRY_TEMPLATE)
    }

    pub fn static_path(&self, object_type: ObjectType) -> PathBuf {
        self.root.join(object_type.as_str()).join(STATIC_DIR)
    }

    pub fn dialect_static_path(&self, dialect: ManifestDialect) -> PathBuf {
        self.root.join(dialect.tag()).join(STATIC_DIR)
    }

    pub fn load_manifest(&self, dialect: ManifestDialect) -> Result<TemplateSource, PipelineError> {
        load(self.manifest_path(dialect))
    }

    pub fn load_launch(&self, dialect: ManifestDialect) -> Result<TemplateSource, PipelineError> {
        load(self.launch_path(dialect))
    }

    pub fn load_entry(&self, object_type: ObjectType) -> Result<TemplateSource, PipelineError> {
        load(self.entry_path(object_type))
    }

    /// Static asset directory for an object type; must exist.
    pub fn static_assets(&self, object_type: ObjectType) -> Result<PathBuf, PipelineError> {
        let dir = self.static_path(object_type);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(PipelineError::TemplateNotFound(dir))
        }
    }

    /// Runtime shims shared by every package of a dialect, if provided.
    pub fn dialect_assets(&self, dialect: ManifestDialect) -> Option<PathBuf> {
        let dir = self.dialect_static_path(dialect);
        dir.is_dir().then_some(dir)
    }

    /// Every template the pipeline may ask for, and whether it is present.
    pub fn inventory(&self) -> Vec<TemplateEntry> {
        let mut entries = vec![];

        for dialect in ManifestDialect::ALL {
            entries.push(TemplateEntry::probe("manifest", dialect.tag(), self.manifest_path(dialect)));
            entries.push(TemplateEntry::probe("launch", dialect.tag(), self.launch_path(dialect)));
        }
        for object_type in ObjectType::ALL {
            if object_type == ObjectType::Passthrough {
                continue;
            }
            entries.push(TemplateEntry::probe("entry", object_type.as_str(), self.entry_path(object_type)));
            entries.push(TemplateEntry::probe("static", object_type.as_str(), self.static_path(object_type)));
        }

        entries
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateEntry {
    pub kind: &'static str,
    pub key: &'static str,
    pub path: PathBuf,
    pub present: bool,
}

impl TemplateEntry {
    fn probe(kind: &'static str, key: &'static str, path: PathBuf) -> Self {
        let present = path.exists();
        Self { kind, key, path, present }
    }
}

fn load(path: PathBuf) -> Result<TemplateSource, PipelineError> {
    match fs::read_to_string(&path) {
        Ok(text) => Ok(TemplateSource { path, text }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PipelineError::TemplateNotFound(path)),
        Err(e) => Err(PipelineError::io(&path, e)),
    }
}
