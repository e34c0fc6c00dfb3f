//! ScormPack CLI - Bridge interface for the authoring backend
//!
//! Commands: build, validate, sweep, purge, templates
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on rejected input or a failed build, 1 on setup failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

use scormpack_core::{BuildOptions, BuildPipeline, PipelineConfig, PipelineError, RawInput};

#[derive(Parser)]
#[command(name = "scormpack-cli")]
#[command(about = "ScormPack CLI - Course Package Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file; overrides the directory flags
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to templates directory
    #[arg(short, long, default_value = "templates", global = true)]
    templates_dir: PathBuf,

    /// Directory archives are written to
    #[arg(short, long, default_value = "output", global = true)]
    output_dir: PathBuf,

    /// Parent of working directories and extracted uploads
    #[arg(short, long, default_value = "temp", global = true)]
    scratch_dir: PathBuf,

    /// Passthrough content used when no upload or contentPath is given
    #[arg(long, global = true)]
    content_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the templates the pipeline may use and whether each is present
    Templates,

    /// Validate a build request without building
    Validate {
        /// JSON payload (form fields); "-" reads stdin
        #[arg(short, long)]
        payload: String,
    },

    /// Build a package
    Build {
        /// JSON payload (form fields); "-" reads stdin
        #[arg(short, long)]
        payload: String,

        /// Uploaded content bundle (.zip) for passthrough builds
        #[arg(short, long)]
        upload: Option<PathBuf>,

        /// Leave the working directory as the artifact instead of archiving
        #[arg(long)]
        no_archive: bool,

        /// Keep the working directory after archiving
        #[arg(long)]
        keep_work_dir: bool,

        /// Explicit working directory (cleared first)
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },

    /// Apply the age/count retention policy to archived outputs
    Sweep,

    /// Remove the whole scratch area
    Purge,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbose {
        0 => "scormpack_core=info,scormpack_cli=info",
        1 => "scormpack_core=debug,scormpack_cli=debug",
        _ => "scormpack_core=trace,scormpack_cli=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, PipelineError> {
    if let Some(path) = &cli.config {
        return PipelineConfig::load(path);
    }
    let config = PipelineConfig::new(&cli.templates_dir, &cli.output_dir, &cli.scratch_dir);
    Ok(match &cli.content_dir {
        Some(dir) => config.with_default_content_dir(dir),
        None => config,
    })
}

fn read_payload(payload: &str) -> Result<RawInput, PipelineError> {
    let text = if payload == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| PipelineError::io(Path::new("<stdin>"), e))?;
        buf
    } else if let Some(path) = payload.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?
    } else {
        payload.to_string()
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PipelineError::MalformedInput("payload must be a JSON object".into())),
        Err(e) => Err(PipelineError::MalformedInput(format!("invalid payload: {e}"))),
    }
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

fn failure(e: &PipelineError) -> ExitCode {
    let mut output = json!({
        "success": false,
        "error": e.to_string(),
    });
    if let PipelineError::SchemaValidation(violations) = e {
        output["violations"] = json!(violations);
    }
    if let PipelineError::IncompleteArtifact(report) = e {
        output["missing"] = json!(report);
    }
    print_json(&output);

    if e.is_input_error() || matches!(e, PipelineError::IncompleteArtifact(_)) {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            print_json(&json!({"success": false, "error": format!("Failed to load config: {e}")}));
            return ExitCode::FAILURE;
        }
    };

    let pipeline = BuildPipeline::new(config);

    match cli.command {
        Commands::Templates => {
            print_json(&pipeline.config().templates().inventory());
            ExitCode::SUCCESS
        }

        Commands::Validate { payload } => {
            let input = match read_payload(&payload) {
                Ok(i) => i,
                Err(e) => return failure(&e),
            };

            match pipeline.validate(&input) {
                Ok(result) => {
                    print_json(&result);
                    if result.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2) // Validation failure
                    }
                }
                Err(e) => failure(&e),
            }
        }

        Commands::Build {
            payload,
            upload,
            no_archive,
            keep_work_dir,
            work_dir,
        } => {
            let input = match read_payload(&payload) {
                Ok(i) => i,
                Err(e) => return failure(&e),
            };
            let options = BuildOptions {
                archive: !no_archive,
                keep_working_dir: keep_work_dir,
                work_dir,
            };

            match pipeline.handle(&input, upload.as_deref(), &options) {
                Ok(artifact) => {
                    // Storage stays bounded after every successful build.
                    let sweep = if artifact.archived {
                        Some(pipeline.config().retention_manager().sweep_archives())
                    } else {
                        None
                    };
                    print_json(&json!({
                        "success": true,
                        "artifact": artifact,
                        "sweep": sweep,
                    }));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    warn!(error = %e, "build rejected");
                    failure(&e)
                }
            }
        }

        Commands::Sweep => {
            let summary = pipeline.config().retention_manager().sweep_archives();
            print_json(&json!({"success": true, "sweep": summary}));
            ExitCode::SUCCESS
        }

        Commands::Purge => {
            let summary = pipeline.config().retention_manager().purge_working_root();
            print_json(&json!({"success": true, "purge": summary}));
            ExitCode::SUCCESS
        }
    }
}
