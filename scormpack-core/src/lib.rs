//! ScormPack Core - Course Package Compiler
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Input Is Rejected Before Any Filesystem Work
//! 2. Templates Are Caller-Supplied, Never Location-Derived
//! 3. Nothing Ships Without Passing The Integrity Check
//! 4. Archives Appear Complete Or Not At All
//! 5. Output Storage Is Bounded By Retention

pub mod archive;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod hashing;
pub mod integrity;
pub mod manifest;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod retention;
pub mod sanitize;
pub mod spec;
pub mod templates;
pub mod upload;
pub mod validation;
pub mod workspace;

pub use archive::{ArchiveName, PackageArchiver};
pub use config::PipelineConfig;
pub use content::{ContentGenerator, ContentStrategy};
pub use error::{PipelineError, SchemaViolation};
pub use export::{ExportEmitter, ExportSnapshot};
pub use hashing::{canonical_json, compute_spec_hash};
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use normalize::{RawInput, SpecNormalizer};
pub use pipeline::{BuildArtifact, BuildOptions, BuildPipeline};
pub use retention::{RetentionManager, RetentionPolicy, SweepSummary};
pub use sanitize::sanitize_name;
pub use spec::{BuildSpec, ManifestDialect, ObjectType};
pub use templates::TemplateLayout;
pub use validation::{ValidationResult, ValidationRule, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
