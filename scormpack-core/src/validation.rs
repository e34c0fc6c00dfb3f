//! Schema Validation - Rule/Report Separation
//!
//! Rules inspect the raw JSON document and produce structured violations.
//! The validator runs every rule so a rejection names every bad field.
//!
//! Shape, types, per-type required fields and value ranges come from the
//! bundled JSON Schema. Path containment is checked in code.

use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path};
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{PipelineError, SchemaViolation};

/// Schema for a normalized build document.
pub const BUILD_SPEC_SCHEMA: &str = include_str!("../schemas/build-spec.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Compile the bundled schema once per process.
fn compiled_schema() -> Result<&'static jsonschema::Validator, &'static str> {
    COMPILED_SCHEMA
        .get_or_init(|| {
            debug!("compiling build spec schema");
            let schema: Value = serde_json::from_str(BUILD_SPEC_SCHEMA)
                .map_err(|e| format!("invalid build spec schema: {e}"))?;
            jsonschema::validator_for(&schema)
                .map_err(|e| format!("failed to compile build spec schema: {e}"))
        })
        .as_ref()
        .map_err(String::as_str)
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<SchemaViolation>,
}

impl ValidationResult {
    pub fn into_result(self) -> Result<(), PipelineError> {
        if self.valid {
            Ok(())
        } else {
            Err(PipelineError::SchemaValidation(self.violations))
        }
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, doc: &Value) -> Vec<SchemaViolation>;
}

fn is_contained_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

// --- Concrete Rules ---

/// Everything the bundled schema expresses, reported with all errors.
pub struct SchemaRule {
    schema: Result<&'static jsonschema::Validator, &'static str>,
}

impl SchemaRule {
    pub fn new() -> Self {
        Self { schema: compiled_schema() }
    }
}

impl Default for SchemaRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Missing properties are reported at the property's own path.
fn to_violation(error: &ValidationError<'_>) -> SchemaViolation {
    let instance_path = error.instance_path().to_string();
    let schema_path = error.schema_path().to_string();
    let keyword = schema_path.rsplit('/').next().filter(|k| !k.is_empty()).unwrap_or("schema");

    match error.kind() {
        ValidationErrorKind::Required { property } => {
            let name = property.as_str().map_or_else(|| property.to_string(), str::to_string);
            SchemaViolation::new(format!("{instance_path}/{name}"), keyword, "is required")
        }
        _ => {
            let field = if instance_path.is_empty() { "/".to_string() } else { instance_path };
            SchemaViolation::new(field, keyword, error.to_string())
        }
    }
}

impl ValidationRule for SchemaRule {
    fn name(&self) -> &'static str { "schema" }

    fn validate(&self, doc: &Value) -> Vec<SchemaViolation> {
        match self.schema {
            Ok(schema) => schema.iter_errors(doc).map(|e| to_violation(&e)).collect(),
            Err(message) => vec![SchemaViolation::new("/", self.name(), message)],
        }
    }
}

/// Launch and SCO paths must stay inside the package.
pub struct PathSafetyRule;

impl ValidationRule for PathSafetyRule {
    fn name(&self) -> &'static str { "format" }

    fn validate(&self, doc: &Value) -> Vec<SchemaViolation> {
        let mut violations = vec![];

        if let Some(launch) = doc.get("launch").and_then(Value::as_str) {
            if !is_contained_relative(launch) {
                violations.push(SchemaViolation::new(
                    "/launch",
                    self.name(),
                    "must be a relative path inside the package",
                ));
            }
        }

        if let Some(Value::Array(items)) = doc.get("sco") {
            for (i, item) in items.iter().enumerate() {
                if let Some(href) = item.get("href").and_then(Value::as_str) {
                    if !href.trim().is_empty() && !is_contained_relative(href) {
                        violations.push(SchemaViolation::new(
                            format!("/sco/{i}/href"),
                            self.name(),
                            "must be a relative path inside the package",
                        ));
                    }
                }
            }
        }

        violations
    }
}

/// Validator orchestrates rules; all rules always run.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule + Send + Sync>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(SchemaRule::new()), Box::new(PathSafetyRule)],
        }
    }

    pub fn validate(&self, doc: &Value) -> ValidationResult {
        let violations: Vec<_> = self.rules.iter().flat_map(|rule| rule.validate(doc)).collect();

        ValidationResult {
            valid: violations.is_empty(),
            violations,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
