//! Template Rendering - Key/Value Substitution
//!
//! `render(template, vars)` interpolates a flat variable map into a Tera
//! template. Referencing an undefined variable or a malformed template is a
//! `RenderError`; the available keys are logged alongside it.

use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tera::{Context, Tera};
use tracing::error;

use crate::error::PipelineError;
use crate::spec::{BuildSpec, Payload};
use crate::templates::TemplateSource;
use crate::ENGINE_VERSION;

/// Directory that passthrough content is copied into.
pub const CONTENT_DIR: &str = "content";

#[derive(Debug, Clone, Default)]
pub struct RenderVars {
    values: BTreeMap<String, Value>,
}

impl RenderVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<(), PipelineError> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    fn to_context(&self) -> Context {
        let mut context = Context::new();
        for (key, value) in &self.values {
            context.insert(key.as_str(), value);
        }
        context
    }

    /// Variables every template may use, plus the payload fields of the active object type.
    pub fn for_spec(spec: &BuildSpec) -> Result<Self, PipelineError> {
        let b64 = |s: &str| base64::engine::general_purpose::STANDARD.encode(s.as_bytes());
        let mut vars = Self::new();

        vars.insert("identifier", &spec.identifier)?;
        vars.insert("title", &spec.title)?;
        vars.insert("launch", &spec.launch)?;
        vars.insert("scorm_version", &spec.scorm_version)?;
        vars.insert("dialect", spec.dialect().tag())?;
        vars.insert("object_type", spec.object_type().as_str())?;
        vars.insert("course_title", spec.course_title().unwrap_or(spec.title.as_str()))?;
        vars.insert("author", spec.metadata.author.as_deref().unwrap_or_default())?;
        vars.insert(
            "description",
            spec.metadata.description.as_deref().unwrap_or(spec.title.as_str()),
        )?;
        vars.insert("engine_version", ENGINE_VERSION)?;
        vars.insert("generated_at", chrono::Utc::now().to_rfc3339())?;

        let scos: Vec<_> = spec
            .sco
            .iter()
            .enumerate()
            .map(|(i, sco)| {
                serde_json::json!({
                    "identifier": sco.identifier.clone().unwrap_or_else(|| format!("SCO-{}", i + 1)),
                    "title": sco.title.clone().unwrap_or_else(|| sco.href.clone()),
                    "href": sco.href,
                })
            })
            .collect();
        vars.insert("scos", scos)?;

        match &spec.payload {
            Payload::InteractiveExercise(p) => {
                vars.insert("practice_title", &p.practice_title)?;
                vars.insert("language", &p.language)?;
                vars.insert("instructions", &p.instructions)?;
                vars.insert("instructions_markdown", &p.instructions_markdown)?;
                vars.insert("starting_code", &p.starting_code)?;
                vars.insert("config_code", &p.config_code)?;
                vars.insert("starting_code_b64", b64(&p.starting_code))?;
                vars.insert("config_code_b64", b64(&p.config_code))?;
            }
            Payload::LinearLesson(p) => {
                vars.insert("lesson_title", &p.lesson_title)?;
                vars.insert("page_url", p.page_url.as_deref().unwrap_or_default())?;
                vars.insert("settings", &p.settings)?;
                vars.insert("settings_json", serde_json::to_string(&p.settings)?)?;
            }
            Payload::Passthrough(_) => {
                vars.insert("content_dir", CONTENT_DIR)?;
            }
        }

        Ok(vars)
    }
}

/// Render `template` with `vars`. HTML templates are autoescaped.
pub fn render(template: &TemplateSource, vars: &RenderVars) -> Result<String, PipelineError> {
    let autoescape = template
        .path
        .to_string_lossy()
        .trim_end_matches(".tera")
        .ends_with(".html");

    Tera::one_off(&template.text, &vars.to_context(), autoescape).map_err(|e| {
        let message = describe(&e);
        error!(
            template = %template.name(),
            fields = ?vars.keys(),
            error = %message,
            "template interpolation failed"
        );
        PipelineError::Render {
            template: template.name(),
            message,
        }
    })
}

/// Tera nests the useful detail ("Variable `x` not found") in the source chain.
fn describe(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
