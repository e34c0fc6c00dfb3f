//! Spec Normalizer - Raw Input to Validated BuildSpec
//!
//! Structured object types map known form fields directly; anything else
//! goes through the legacy `specJson` path. Both paths end in the same
//! schema validation before a typed `BuildSpec` is produced.

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{PipelineError, SchemaViolation};
use crate::sanitize::compact_token;
use crate::spec::{BuildSpec, ObjectType, DEFAULT_LAUNCH_FILE, DEFAULT_SCORM_VERSION};
use crate::validation::{ValidationResult, Validator};

/// Raw caller-supplied attributes, already decoded by the request layer.
pub type RawInput = Map<String, Value>;

pub const LEGACY_SPEC_FIELD: &str = "specJson";
const EXERCISE_AUTHOR: &str = "SCORM Generator";

pub struct SpecNormalizer {
    validator: Validator,
}

impl SpecNormalizer {
    pub fn new() -> Self {
        Self { validator: Validator::new() }
    }

    /// Normalize and validate. No filesystem access happens here.
    pub fn normalize(&self, input: &RawInput) -> Result<BuildSpec, PipelineError> {
        let doc = self.to_document(input)?;
        self.validator.validate(&doc).into_result()?;

        let spec: BuildSpec = serde_json::from_value(doc).map_err(|e| {
            PipelineError::SchemaValidation(vec![SchemaViolation::new("/", "type", e.to_string())])
        })?;

        debug!(
            identifier = %spec.identifier,
            object_type = %spec.object_type(),
            dialect = %spec.dialect(),
            "normalized build spec"
        );
        Ok(spec)
    }

    /// Run schema validation only, reporting every violation.
    pub fn check(&self, input: &RawInput) -> Result<ValidationResult, PipelineError> {
        let doc = self.to_document(input)?;
        Ok(self.validator.validate(&doc))
    }

    /// Build the JSON document that schema validation runs against.
    pub fn to_document(&self, input: &RawInput) -> Result<Value, PipelineError> {
        match form_str(input, "objectType").and_then(ObjectType::from_tag) {
            Some(ObjectType::InteractiveExercise) => Ok(exercise_document(input)),
            Some(ObjectType::LinearLesson) => Ok(lesson_document(input)),
            Some(ObjectType::Passthrough) | None => legacy_document(input),
        }
    }
}

impl Default for SpecNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// String form value. Other types are left for the schema to report.
fn form_str<'a>(input: &'a RawInput, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}

/// Non-null form value, passed through with its original type.
fn form_value(input: &RawInput, key: &str) -> Option<Value> {
    input.get(key).filter(|v| !v.is_null()).cloned()
}

fn put(doc: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        doc.insert(key.to_string(), v);
    }
}

fn exercise_document(input: &RawInput) -> Value {
    let practice_title = form_value(input, "practiceTitle");
    let mut doc = Map::new();

    put(&mut doc, "title", practice_title.clone());
    put(&mut doc, "identifier", form_value(input, "objectId"));
    doc.insert(
        "scormVersion".into(),
        form_value(input, "scormVersion").unwrap_or_else(|| json!(DEFAULT_SCORM_VERSION)),
    );
    doc.insert("launch".into(), json!(DEFAULT_LAUNCH_FILE));
    doc.insert("objectType".into(), json!(ObjectType::InteractiveExercise.as_str()));
    put(&mut doc, "courseTitle", form_value(input, "courseTitle"));
    put(&mut doc, "practiceTitle", practice_title);
    put(&mut doc, "language", form_value(input, "language"));
    for key in ["instructions", "instructionsMarkdown", "startingCode", "configCode"] {
        doc.insert(key.into(), form_value(input, key).unwrap_or_else(|| json!("")));
    }
    doc.insert(
        "metadata".into(),
        json!({
            "author": EXERCISE_AUTHOR,
            "description": form_str(input, "practiceTitle").unwrap_or_default()
        }),
    );

    Value::Object(doc)
}

fn lesson_document(input: &RawInput) -> Value {
    let title = form_value(input, "title");
    let identifier = match form_value(input, "identifier") {
        Some(Value::String(s)) if s.trim().is_empty() => None,
        other => other,
    }
    .unwrap_or_else(|| {
        json!(generate_lesson_id(
            form_str(input, "courseTitle").unwrap_or_default(),
            form_str(input, "title").unwrap_or_default(),
        ))
    });

    let passing_score = match input.get("passingScore") {
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
    .unwrap_or(70);
    let progress = |key: &str| form_value(input, key).unwrap_or_else(|| json!("pageProgress"));
    let disable_context_menu = matches!(
        input.get("disableContextMenu"),
        Some(Value::Bool(true))
    ) || form_str(input, "disableContextMenu") == Some("on");

    let mut doc = Map::new();
    put(&mut doc, "title", title.clone());
    doc.insert("identifier".into(), identifier);
    doc.insert(
        "scormVersion".into(),
        form_value(input, "scormVersion").unwrap_or_else(|| json!(DEFAULT_SCORM_VERSION)),
    );
    doc.insert("launch".into(), json!(DEFAULT_LAUNCH_FILE));
    doc.insert("objectType".into(), json!(ObjectType::LinearLesson.as_str()));
    put(&mut doc, "courseTitle", form_value(input, "courseTitle"));
    put(&mut doc, "lessonTitle", title);
    put(&mut doc, "pageUrl", form_value(input, "pageUrl"));
    doc.insert(
        "settings".into(),
        json!({
            "scoring": {
                "scoreMethod": progress("scoreMethod"),
                "completionStatus": progress("completionStatus"),
                "passingScore": passing_score,
                "maxScore": 100,
                "minScore": 0,
                "roundScore": true
            },
            "tracking": {
                "trackVideoProgress": true,
                "trackPageProgress": true,
                "trackHintOpenings": true,
                "trackSolutionOpenings": true
            },
            "display": {
                "completionBar": progress("completionBar"),
                "disableContextMenu": disable_context_menu,
                "videoCompletionPercent": 95
            }
        }),
    );

    Value::Object(doc)
}

fn legacy_document(input: &RawInput) -> Result<Value, PipelineError> {
    let mut doc = match input.get(LEGACY_SPEC_FIELD) {
        Some(Value::String(raw)) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|e| PipelineError::MalformedInput(format!("invalid {LEGACY_SPEC_FIELD}: {e}")))?,
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => {
            return Err(PipelineError::MalformedInput(format!(
                "no structured object type and no '{LEGACY_SPEC_FIELD}' payload"
            )))
        }
    };
    let map = doc
        .as_object_mut()
        .ok_or_else(|| PipelineError::MalformedInput(format!("{LEGACY_SPEC_FIELD} must be a JSON object")))?;

    if map.get("scormVersion").map_or(true, Value::is_null) {
        map.insert("scormVersion".into(), json!(DEFAULT_SCORM_VERSION));
    }

    // Canonicalize recognized tags; unknown ones are left for the schema to reject.
    let canonical = match map.get("objectType") {
        None | Some(Value::Null) => Some(ObjectType::Passthrough),
        Some(Value::String(tag)) => ObjectType::from_tag(tag),
        Some(_) => None,
    };
    if let Some(object_type) = canonical {
        map.insert("objectType".into(), json!(object_type.as_str()));
    }

    Ok(doc)
}

/// `<course[..10]>_<lesson[..15]>_<6-digit time suffix>`
pub fn generate_lesson_id(course_title: &str, lesson_title: &str) -> String {
    let suffix = Utc::now().timestamp_millis().rem_euclid(1_000_000);
    format!(
        "{}_{}_{:06}",
        compact_token(course_title, 10),
        compact_token(lesson_title, 15),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Payload;

    fn raw(value: Value) -> RawInput {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_exercise_defaults_applied() {
        let spec = SpecNormalizer::new()
            .normalize(&raw(json!({
                "objectType": "code-practice",
                "practiceTitle": "Loops",
                "objectId": "loops-1",
                "courseTitle": "Rust 101",
                "language": "rust",
                "instructions": "<p>Write a loop</p>"
            })))
            .unwrap();

        assert_eq!(spec.title, "Loops");
        assert_eq!(spec.identifier, "loops-1");
        assert_eq!(spec.scorm_version, "1.2");
        assert_eq!(spec.launch, "index.html");
        assert_eq!(spec.metadata.author.as_deref(), Some(EXERCISE_AUTHOR));
        match spec.payload {
            Payload::InteractiveExercise(p) => {
                assert_eq!(p.starting_code, "");
                assert_eq!(p.config_code, "");
                assert_eq!(p.instructions_markdown, "");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_lesson_identifier_generated_and_settings_defaulted() {
        let spec = SpecNormalizer::new()
            .normalize(&raw(json!({
                "objectType": "lesson",
                "title": "Getting Started With Ownership",
                "courseTitle": "Rust Fundamentals",
                "passingScore": "not-a-number",
                "disableContextMenu": "on"
            })))
            .unwrap();

        assert!(spec.identifier.starts_with("rustfundam_gettingstartedw_"));
        match spec.payload {
            Payload::LinearLesson(p) => {
                assert_eq!(p.settings.scoring.passing_score, 70);
                assert!(p.settings.display.disable_context_menu);
                assert_eq!(p.settings.display.completion_bar, "pageProgress");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let err = SpecNormalizer::new().normalize(&raw(json!({"title": "x"}))).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));

        let err = SpecNormalizer::new()
            .normalize(&raw(json!({"specJson": "{not json"})))
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn test_legacy_path_defaults_version_and_type() {
        let spec = SpecNormalizer::new()
            .normalize(&raw(json!({
                "specJson": r#"{"identifier": "legacy", "title": "Legacy", "launch": "start.html"}"#
            })))
            .unwrap();

        assert_eq!(spec.scorm_version, "1.2");
        assert_eq!(spec.object_type(), ObjectType::Passthrough);
        assert_eq!(spec.launch, "start.html");
    }

    #[test]
    fn test_legacy_path_reports_all_violations() {
        let err = SpecNormalizer::new()
            .normalize(&raw(json!({
                "specJson": r#"{"objectType": "code-practice", "sco": [{"href": 7}]}"#
            })))
            .unwrap_err();

        match err {
            PipelineError::SchemaValidation(violations) => {
                let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
                assert!(fields.contains(&"/title"));
                assert!(fields.contains(&"/identifier"));
                assert!(fields.contains(&"/language"));
                assert!(fields.contains(&"/sco/0/href"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_form_values_keep_their_type() {
        let err = SpecNormalizer::new()
            .normalize(&raw(json!({
                "objectType": "code-practice",
                "objectId": ["a"],
                "practiceTitle": "Loops",
                "courseTitle": "Rust 101",
                "language": 7
            })))
            .unwrap_err();

        match err {
            PipelineError::SchemaValidation(violations) => {
                let typed: Vec<_> = violations
                    .iter()
                    .filter(|v| v.rule == "type")
                    .map(|v| v.field.as_str())
                    .collect();
                assert!(typed.contains(&"/identifier"), "{violations:?}");
                assert!(typed.contains(&"/language"), "{violations:?}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_legacy_payload_may_be_an_object() {
        let spec = SpecNormalizer::new()
            .normalize(&raw(json!({
                "specJson": {"identifier": "inline", "title": "Inline"}
            })))
            .unwrap();
        assert_eq!(spec.identifier, "inline");
        assert_eq!(spec.object_type(), ObjectType::Passthrough);
    }

    #[test]
    fn test_lesson_id_shape() {
        let id = generate_lesson_id("Course!", "Lesson?");
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts[0], "course");
        assert_eq!(parts[1], "lesson");
        assert_eq!(parts[2].len(), 6);
    }
}
