//! Pipeline Errors - One Variant Per Failure Kind
//!
//! Input errors abort before any working-directory mutation.
//! Cleanup failures never surface here; they are logged by the sweeps.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::integrity::IntegrityReport;
use crate::spec::ObjectType;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Schema validation failed: {}", join_violations(.0))]
    SchemaValidation(Vec<SchemaViolation>),

    #[error("Template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Failed to render template '{template}': {message}")]
    Render { template: String, message: String },

    #[error("Content source not found: {0}")]
    ContentSourceNotFound(PathBuf),

    #[error("Incomplete artifact: {0}")]
    IncompleteArtifact(IntegrityReport),

    #[error("Failed to write archive {path}: {message}")]
    ArchiveWrite { path: PathBuf, message: String },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("No content strategy registered for object type '{0}'")]
    UnsupportedObjectType(ObjectType),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn archive_write(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::ArchiveWrite {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    /// True for errors caused by the caller's input rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput(_)
                | Self::SchemaValidation(_)
                | Self::InvalidUpload(_)
                | Self::ContentSourceNotFound(_)
        )
    }
}

/// A single field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaViolation {
    pub field: String,
    pub rule: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, rule: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
