//! Export Snapshot - Authoring State Shipped Inside The Package
//!
//! Lets a finished exercise be re-imported without scraping rendered HTML.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::PipelineError;
use crate::sanitize::sanitize_first;
use crate::spec::{BuildSpec, Payload};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";
const EXPORT_FALLBACK_NAME: &str = "code-practice";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub course_title: String,
    pub practice_title: String,
    pub object_id: String,
    pub language: String,
    /// Source form when supplied, rendered form otherwise.
    pub instructions: String,
    pub config_code: String,
    pub starting_code: String,
    pub export_date: String,
    pub version: String,
}

impl ExportSnapshot {
    /// `None` for object types without export support.
    pub fn from_spec(spec: &BuildSpec) -> Option<Self> {
        let Payload::InteractiveExercise(p) = &spec.payload else {
            return None;
        };
        let instructions = if p.instructions_markdown.trim().is_empty() {
            p.instructions.clone()
        } else {
            p.instructions_markdown.clone()
        };

        Some(Self {
            course_title: p.course_title.clone(),
            practice_title: p.practice_title.clone(),
            object_id: spec.identifier.clone(),
            language: p.language.clone(),
            instructions,
            config_code: p.config_code.clone(),
            starting_code: p.starting_code.clone(),
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: EXPORT_FORMAT_VERSION.to_string(),
        })
    }

    /// `<sanitized practice title>-export.json`
    pub fn file_name(&self) -> String {
        format!("{}-export.json", sanitize_first([self.practice_title.as_str()], EXPORT_FALLBACK_NAME))
    }
}

pub struct ExportEmitter;

impl ExportEmitter {
    /// Write the snapshot into `work_dir` when the object type supports it.
    pub fn emit(spec: &BuildSpec, work_dir: &Path) -> Result<Option<PathBuf>, PipelineError> {
        if !spec.object_type().supports_export() {
            return Ok(None);
        }
        let Some(snapshot) = ExportSnapshot::from_spec(spec) else {
            return Ok(None);
        };

        let path = work_dir.join(snapshot.file_name());
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))?;
        info!(file = %snapshot.file_name(), "wrote export snapshot");
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn exercise(markdown: &str) -> BuildSpec {
        serde_json::from_value(json!({
            "identifier": "loops-1", "title": "Loops!", "objectType": "code-practice",
            "courseTitle": "Rust", "practiceTitle": "Loops & Ranges", "language": "rust",
            "instructions": "<p>Write a <b>loop</b></p>",
            "instructionsMarkdown": markdown,
            "startingCode": "fn main() {}",
            "configCode": "// setup"
        }))
        .unwrap()
    }

    #[test]
    fn test_snapshot_prefers_source_instructions() {
        let snapshot = ExportSnapshot::from_spec(&exercise("Write a **loop**")).unwrap();
        assert_eq!(snapshot.instructions, "Write a **loop**");

        let snapshot = ExportSnapshot::from_spec(&exercise("")).unwrap();
        assert_eq!(snapshot.instructions, "<p>Write a <b>loop</b></p>");
    }

    #[test]
    fn test_emit_writes_fixed_keys() {
        let work = TempDir::new().unwrap();
        let path = ExportEmitter::emit(&exercise("md"), work.path()).unwrap().unwrap();
        assert!(path.ends_with("loops-ranges-export.json"));

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let mut keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "configCode", "courseTitle", "exportDate", "instructions", "language",
                "objectId", "practiceTitle", "startingCode", "version"
            ]
        );
        assert_eq!(doc["version"], EXPORT_FORMAT_VERSION);
    }

    #[test]
    fn test_no_export_for_passthrough() {
        let work = TempDir::new().unwrap();
        let spec: BuildSpec = serde_json::from_value(json!({
            "identifier": "p", "title": "P", "objectType": "passthrough"
        }))
        .unwrap();
        assert!(ExportEmitter::emit(&spec, work.path()).unwrap().is_none());
    }
}
