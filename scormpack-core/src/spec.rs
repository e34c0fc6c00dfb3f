//! Build Specification - Normalized, Immutable Package Description
//!
//! A `BuildSpec` is produced once by the normalizer and only read afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_LAUNCH_FILE: &str = "index.html";
pub const DEFAULT_SCORM_VERSION: &str = "1.2";

/// Closed set of package object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "code-practice")]
    InteractiveExercise,
    #[serde(rename = "lesson")]
    LinearLesson,
    #[serde(rename = "passthrough")]
    Passthrough,
}

impl ObjectType {
    pub const ALL: [ObjectType; 3] = [
        ObjectType::InteractiveExercise,
        ObjectType::LinearLesson,
        ObjectType::Passthrough,
    ];

    /// Canonical tag, also the template subdirectory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::InteractiveExercise => "code-practice",
            ObjectType::LinearLesson => "lesson",
            ObjectType::Passthrough => "passthrough",
        }
    }

    /// Resolve a caller-supplied tag, accepting the descriptive aliases.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "code-practice" | "interactive-exercise" => Some(ObjectType::InteractiveExercise),
            "lesson" | "linear-lesson" => Some(ObjectType::LinearLesson),
            "passthrough" => Some(ObjectType::Passthrough),
            _ => None,
        }
    }

    pub fn supports_export(&self) -> bool {
        matches!(self, ObjectType::InteractiveExercise)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manifest dialect. Unrecognized version strings select the newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestDialect {
    Scorm12,
    Scorm2004,
}

impl ManifestDialect {
    pub const ALL: [ManifestDialect; 2] = [ManifestDialect::Scorm12, ManifestDialect::Scorm2004];

    pub fn from_version(version: &str) -> Self {
        match version.trim() {
            "1.2" => ManifestDialect::Scorm12,
            _ => ManifestDialect::Scorm2004,
        }
    }

    /// Version tag reported on the artifact and used as template folder.
    pub fn tag(&self) -> &'static str {
        match self {
            ManifestDialect::Scorm12 => "scorm12",
            ManifestDialect::Scorm2004 => "scorm2004",
        }
    }
}

impl fmt::Display for ManifestDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoRef {
    pub href: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    pub identifier: String,
    pub title: String,
    #[serde(default = "default_scorm_version")]
    pub scorm_version: String,
    /// Entry file name, relative to the working directory root.
    #[serde(default = "default_launch")]
    pub launch: String,
    #[serde(default)]
    pub sco: Vec<ScoRef>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub payload: Payload,
}

fn default_scorm_version() -> String { DEFAULT_SCORM_VERSION.to_string() }
fn default_launch() -> String { DEFAULT_LAUNCH_FILE.to_string() }

/// Type-specific payload, discriminated by `objectType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "objectType")]
pub enum Payload {
    #[serde(rename = "code-practice")]
    InteractiveExercise(ExercisePayload),
    #[serde(rename = "lesson")]
    LinearLesson(LessonPayload),
    #[serde(rename = "passthrough")]
    Passthrough(PassthroughPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExercisePayload {
    pub course_title: String,
    pub practice_title: String,
    pub language: String,
    /// Rendered (HTML) instructions.
    #[serde(default)]
    pub instructions: String,
    /// Source (markdown) instructions, preferred for export.
    #[serde(default)]
    pub instructions_markdown: String,
    #[serde(default)]
    pub starting_code: String,
    /// Hidden setup code run before the student's code.
    #[serde(default)]
    pub config_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPayload {
    pub course_title: String,
    pub lesson_title: String,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub settings: LessonSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassthroughPayload {
    /// External content directory, copied verbatim into `content/`.
    #[serde(default)]
    pub content_path: Option<PathBuf>,
}

/// Settings written next to a lesson's entry page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonSettings {
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub tracking: TrackingSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSettings {
    #[serde(default = "default_progress_mode")]
    pub score_method: String,
    #[serde(default = "default_progress_mode")]
    pub completion_status: String,
    #[serde(default = "default_passing_score")]
    pub passing_score: u32,
    #[serde(default = "default_max_score")]
    pub max_score: u32,
    #[serde(default)]
    pub min_score: u32,
    #[serde(default = "default_true")]
    pub round_score: bool,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            score_method: default_progress_mode(),
            completion_status: default_progress_mode(),
            passing_score: default_passing_score(),
            max_score: default_max_score(),
            min_score: 0,
            round_score: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSettings {
    #[serde(default = "default_true")]
    pub track_video_progress: bool,
    #[serde(default = "default_true")]
    pub track_page_progress: bool,
    #[serde(default = "default_true")]
    pub track_hint_openings: bool,
    #[serde(default = "default_true")]
    pub track_solution_openings: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            track_video_progress: true,
            track_page_progress: true,
            track_hint_openings: true,
            track_solution_openings: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    #[serde(default = "default_progress_mode")]
    pub completion_bar: String,
    #[serde(default)]
    pub disable_context_menu: bool,
    #[serde(default = "default_video_completion")]
    pub video_completion_percent: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            completion_bar: default_progress_mode(),
            disable_context_menu: false,
            video_completion_percent: default_video_completion(),
        }
    }
}

fn default_true() -> bool { true }
fn default_progress_mode() -> String { "pageProgress".to_string() }
fn default_passing_score() -> u32 { 70 }
fn default_max_score() -> u32 { 100 }
fn default_video_completion() -> u32 { 95 }

impl BuildSpec {
    pub fn object_type(&self) -> ObjectType {
        match self.payload {
            Payload::InteractiveExercise(_) => ObjectType::InteractiveExercise,
            Payload::LinearLesson(_) => ObjectType::LinearLesson,
            Payload::Passthrough(_) => ObjectType::Passthrough,
        }
    }

    pub fn dialect(&self) -> ManifestDialect {
        ManifestDialect::from_version(&self.scorm_version)
    }

    pub fn course_title(&self) -> Option<&str> {
        match &self.payload {
            Payload::InteractiveExercise(p) => Some(&p.course_title),
            Payload::LinearLesson(p) => Some(&p.course_title),
            Payload::Passthrough(_) => None,
        }
    }

    /// Declared passthrough content source, if any.
    pub fn content_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::Passthrough(p) => p.content_path.as_deref(),
            _ => None,
        }
    }

    /// Point a passthrough spec at an extracted upload. Other types are returned unchanged.
    pub fn with_content_source(mut self, source: &Path) -> Self {
        if let Payload::Passthrough(ref mut p) = self.payload {
            p.content_path = Some(source.to_path_buf());
        }
        self
    }
}
