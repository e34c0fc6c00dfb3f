//! Content Generation - One Strategy Per Object Type
//!
//! Every strategy must leave a file at the package's launch path. That
//! contract is enforced afterwards by the integrity check, not here.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::PipelineError;
use crate::render::{render, RenderVars, CONTENT_DIR};
use crate::spec::{BuildSpec, ObjectType, Payload};
use crate::templates::TemplateLayout;
use crate::workspace::copy_dir_all;

/// File written next to a lesson's entry page.
pub const LESSON_SETTINGS_FILE: &str = "lesson-settings.json";

/// Everything a strategy may read while populating a working directory.
pub struct MaterializeContext<'a> {
    pub spec: &'a BuildSpec,
    pub templates: &'a TemplateLayout,
    pub vars: &'a RenderVars,
    pub work_dir: &'a Path,
    /// Passthrough fallback when no content source is declared.
    pub default_content_dir: Option<&'a Path>,
}

impl MaterializeContext<'_> {
    fn write(&self, rel: &str, contents: &str) -> Result<(), PipelineError> {
        let path = self.work_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| PipelineError::io(&path, e))
    }

    fn copy_assets(&self, src: &Path) -> Result<(), PipelineError> {
        let copied = copy_dir_all(src, self.work_dir)?;
        debug!(source = %src.display(), files = copied, "copied static assets");
        Ok(())
    }

    fn copy_assets_into_content(&self, source: &Path) -> Result<(), PipelineError> {
        let copied = copy_dir_all(source, &self.work_dir.join(CONTENT_DIR))?;
        debug!(source = %source.display(), files = copied, "copied passthrough content");
        Ok(())
    }

    fn copy_dialect_shims(&self) -> Result<(), PipelineError> {
        match self.templates.dialect_assets(self.spec.dialect()) {
            Some(dir) => self.copy_assets(&dir),
            None => Ok(()),
        }
    }
}

/// Content strategy trait - populates the working directory
pub trait ContentStrategy: Send + Sync {
    fn object_type(&self) -> ObjectType;
    fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<(), PipelineError>;
}

// --- Concrete Strategies ---

/// Templated entry page plus verbatim scripts, styles and runtime shim.
pub struct InteractiveExerciseStrategy;

impl ContentStrategy for InteractiveExerciseStrategy {
    fn object_type(&self) -> ObjectType { ObjectType::InteractiveExercise }

    fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<(), PipelineError> {
        let template = ctx.templates.load_entry(self.object_type())?;
        let assets = ctx.templates.static_assets(self.object_type())?;

        let page = render(&template, ctx.vars)?;
        ctx.write(&ctx.spec.launch, &page)?;

        ctx.copy_assets(&assets)?;
        ctx.copy_dialect_shims()
    }
}

/// Templated entry page plus a synthesized settings file.
pub struct LinearLessonStrategy;

impl ContentStrategy for LinearLessonStrategy {
    fn object_type(&self) -> ObjectType { ObjectType::LinearLesson }

    fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<(), PipelineError> {
        let Payload::LinearLesson(lesson) = &ctx.spec.payload else {
            return Err(PipelineError::UnsupportedObjectType(ctx.spec.object_type()));
        };
        let template = ctx.templates.load_entry(self.object_type())?;
        let assets = ctx.templates.static_assets(self.object_type())?;

        let page = render(&template, ctx.vars)?;
        ctx.write(&ctx.spec.launch, &page)?;
        ctx.write(LESSON_SETTINGS_FILE, &serde_json::to_string_pretty(&lesson.settings)?)?;

        ctx.copy_assets(&assets)?;
        ctx.copy_dialect_shims()
    }
}

/// External content copied verbatim under `content/`, plus a launch page.
pub struct PassthroughStrategy;

impl ContentStrategy for PassthroughStrategy {
    fn object_type(&self) -> ObjectType { ObjectType::Passthrough }

    fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<(), PipelineError> {
        // Resolve everything before touching the working directory.
        let source = ctx
            .spec
            .content_path()
            .or(ctx.default_content_dir)
            .ok_or_else(|| PipelineError::ContentSourceNotFound("<none declared>".into()))?;
        if !source.is_dir() {
            return Err(PipelineError::ContentSourceNotFound(source.to_path_buf()));
        }
        let template = ctx.templates.load_launch(ctx.spec.dialect())?;
        let page = render(&template, ctx.vars)?;

        ctx.copy_assets_into_content(source)?;
        ctx.write(&ctx.spec.launch, &page)
    }
}

/// Strategy registry keyed by object type.
pub struct ContentGenerator {
    strategies: HashMap<ObjectType, Box<dyn ContentStrategy>>,
}

impl ContentGenerator {
    pub fn new() -> Self {
        let mut generator = Self { strategies: HashMap::new() };
        generator.register(Box::new(InteractiveExerciseStrategy));
        generator.register(Box::new(LinearLessonStrategy));
        generator.register(Box::new(PassthroughStrategy));
        generator
    }

    /// Register or replace the strategy for its object type.
    pub fn register(&mut self, strategy: Box<dyn ContentStrategy>) {
        self.strategies.insert(strategy.object_type(), strategy);
    }

    pub fn generate(&self, ctx: &MaterializeContext<'_>) -> Result<(), PipelineError> {
        let object_type = ctx.spec.object_type();
        let strategy = self
            .strategies
            .get(&object_type)
            .ok_or(PipelineError::UnsupportedObjectType(object_type))?;

        debug!(%object_type, work_dir = %ctx.work_dir.display(), "materializing content");
        strategy.materialize(ctx)
    }
}

impl Default for ContentGenerator {
    fn default() -> Self {
        Self::new()
    }
}
