//! CLI command definitions for ad-forge.
//!
//! - `generate`: run the full pipeline for one model
//! - `clean`: remove job working directories and leftover build state
//! - `inspect`: show the coordinates, contacts and index map a model yields

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::emitter::{resolve, FunctionLayout, IndexMap};
use crate::model::{classify_side, DescriptionFileSource, ModelSource, Side};
use crate::pipeline::{JobSpec, PipelineOrchestrator, ToolchainConfig};
use crate::workspace::{Janitor, WorkRoots};

/// Default output directory for generated functions.
const DEFAULT_OUTPUT_DIR: &str = ".";

/// Generates musculoskeletal derivative functions through external AD and build toolchains.
#[derive(Parser)]
#[command(name = "ad-forge")]
#[command(about = "Generate, compile and verify musculoskeletal derivative functions")]
#[command(version)]
#[command(
    long_about = "ad-forge emits an AD source file from a model description, records its expression graph, generates derivative code and compiles it into a loadable library.\n\nExample usage:\n  ad-forge generate models/gait2d.yaml -n gait2d -o ./out --export-grfs"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Toolchain configuration file (YAML).
    #[arg(long, env = "ADFORGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate an external function for a model.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Remove job working directories, the lock file and the driver script.
    Clean(CleanArgs),

    /// Show what a model would produce without running any tool.
    Inspect(InspectArgs),
}

/// Function layout options shared by `generate` and `inspect`.
#[derive(clap::Args, Debug, Default)]
pub struct LayoutArgs {
    /// Joint order, comma-separated.
    #[arg(long, value_delimiter = ',')]
    pub joints_order: Option<Vec<String>>,

    /// Coordinate order, comma-separated.
    #[arg(long, value_delimiter = ',')]
    pub coordinates_order: Option<Vec<String>>,

    /// Body receiving an extra force input (repeatable).
    #[arg(long = "body-force")]
    pub body_forces: Vec<String>,

    /// Body receiving an extra moment input (repeatable).
    #[arg(long = "body-moment")]
    pub body_moments: Vec<String>,

    /// Body whose origin position is exported (repeatable).
    #[arg(long = "export-position")]
    pub export_positions: Vec<String>,

    /// Body whose origin velocity is exported (repeatable).
    #[arg(long = "export-velocity")]
    pub export_velocities: Vec<String>,

    /// Export ground reaction forces per side.
    #[arg(long)]
    pub export_grfs: bool,

    /// Export ground reaction moments per side.
    #[arg(long)]
    pub export_grms: bool,

    /// Export ground reaction forces per contact element.
    #[arg(long)]
    pub export_separate_grfs: bool,

    /// Export contact powers per contact element.
    #[arg(long)]
    pub export_contact_powers: bool,
}

impl LayoutArgs {
    /// Merges these options over `layout`: orders replace, lists extend, flags enable.
    pub fn apply(self, mut layout: FunctionLayout) -> FunctionLayout {
        if self.joints_order.is_some() {
            layout.joints_order = self.joints_order;
        }
        if self.coordinates_order.is_some() {
            layout.coordinates_order = self.coordinates_order;
        }
        layout.body_forces.extend(self.body_forces);
        layout.body_moments.extend(self.body_moments);
        layout.export_positions.extend(self.export_positions);
        layout.export_velocities.extend(self.export_velocities);
        layout.export_grfs |= self.export_grfs;
        layout.export_grms |= self.export_grms;
        layout.export_separate_grfs |= self.export_separate_grfs;
        layout.export_contact_powers |= self.export_contact_powers;
        layout
    }
}

/// Arguments for `ad-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Model description file (YAML or JSON).
    pub model: Option<PathBuf>,

    /// Job file (YAML); command-line options override its values.
    #[arg(long)]
    pub job_file: Option<PathBuf>,

    /// Output directory.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Output filename stem and job name (defaults to the model file stem).
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Build-system generator identifying the native compiler.
    #[arg(long)]
    pub compiler: Option<String>,

    /// Compare the compiled function with reference inverse dynamics.
    #[arg(long)]
    pub verify: bool,

    /// Also generate second-order derivatives.
    #[arg(long)]
    pub second_order: bool,

    /// Stop after code generation; do not build a library.
    #[arg(long)]
    pub no_dll: bool,

    /// Do not copy the import/link library.
    #[arg(long)]
    pub no_import_lib: bool,

    /// Log external tool output at info level.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Override the configured work root.
    #[arg(long)]
    pub work_root: Option<PathBuf>,

    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Output the pipeline report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl GenerateArgs {
    /// Builds the job request from the job file and command-line options.
    pub fn into_job(self) -> anyhow::Result<JobSpec> {
        let mut job = match &self.job_file {
            Some(path) => JobSpec::from_yaml_file(path).map_err(anyhow::Error::msg)?,
            None => {
                let model = self
                    .model
                    .clone()
                    .context("a model file or --job-file is required")?;
                let name = match &self.name {
                    Some(name) => name.clone(),
                    None => model_stem(&model)?,
                };
                JobSpec::new(model, DEFAULT_OUTPUT_DIR, name)
            }
        };

        if let Some(model) = self.model {
            job.model_path = model;
        }
        if let Some(output) = self.output {
            job.output_dir = output;
        }
        if let Some(name) = self.name {
            job.output_filename = name;
        }
        if let Some(compiler) = self.compiler {
            job.compiler = Some(compiler);
        }
        job.verify_id |= self.verify;
        job.second_order_derivatives |= self.second_order;
        job.no_dll |= self.no_dll;
        job.no_import_lib |= self.no_import_lib;
        job.verbose |= self.verbose;
        job.layout = self.layout.apply(job.layout);
        Ok(job)
    }
}

/// Arguments for `ad-forge clean`.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Only remove working directories named exactly NAME. Directories left
    /// by runs with unique job directories are named NAME-<8 hex digits>;
    /// remove those with a plain `clean`.
    #[arg(long, value_name = "NAME")]
    pub job: Option<String>,

    /// Override the configured work root.
    #[arg(long)]
    pub work_root: Option<PathBuf>,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `ad-forge inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Model description file (YAML or JSON).
    pub model: PathBuf,

    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = ToolchainConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    match cli.command {
        Commands::Generate(args) => run_generate_command(config, args).await,
        Commands::Clean(args) => run_clean_command(config, args),
        Commands::Inspect(args) => run_inspect_command(args),
    }
}

// ============================================================================
// Command Implementation
// ============================================================================

async fn run_generate_command(mut config: ToolchainConfig, args: GenerateArgs) -> anyhow::Result<()> {
    if let Some(work_root) = &args.work_root {
        config.work_root = work_root.clone();
    }
    let json = args.json;
    let job = args.into_job()?;

    info!(job = %job.output_filename, model = %job.model_path.display(), "Generating external function");
    let report = PipelineOrchestrator::new(config).run(&job).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("✓ Generated '{}'", report.job);
    let artifacts = [
        ("Source", &report.artifacts.source),
        ("Index map", &report.artifacts.index_map),
        ("Graph", &report.artifacts.graph),
        ("Code", &report.artifacts.generated_code),
        ("Library", &report.artifacts.shared_library),
        ("Import lib", &report.artifacts.import_library),
    ];
    for (label, path) in artifacts {
        if let Some(path) = path {
            println!("  {:<11} {}", format!("{label}:"), path.display());
        }
    }
    if let Some(outcome) = &report.verification {
        let verdict = if outcome.passed { "passed" } else { "MISMATCH" };
        println!(
            "  Verification: {} (max error {:.3e}, tolerance {:.1e})",
            verdict, outcome.max_abs_error, outcome.tolerance
        );
    }
    for warning in &report.cleanup_warnings {
        println!("  Cleanup warning: {warning}");
    }
    Ok(())
}

#[derive(Serialize)]
struct CleanOutput {
    removed: Vec<PathBuf>,
    warnings: Vec<String>,
}

fn run_clean_command(config: ToolchainConfig, args: CleanArgs) -> anyhow::Result<()> {
    let work_root = args.work_root.unwrap_or(config.work_root);
    let report = Janitor::new(WorkRoots::new(&work_root)).clean(args.job.as_deref());
    for warning in &report.warnings {
        warn!(warning = %warning, "Cleanup incomplete");
    }

    if args.json {
        let output = CleanOutput {
            removed: report.removed,
            warnings: report.warnings,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("✓ Cleaned {} ({} removed)", work_root.display(), report.removed.len());
    for path in &report.removed {
        println!("  {}", path.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct ContactSummary {
    name: String,
    body: String,
    side: Option<Side>,
}

#[derive(Serialize)]
struct InspectOutput {
    model: String,
    coordinates: Vec<String>,
    contacts: Vec<ContactSummary>,
    index_map: IndexMap,
}

fn run_inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let model = DescriptionFileSource.load(&args.model)?;
    let layout = args.layout.apply(FunctionLayout::default());
    let resolved = resolve(&model, &layout)?;
    let index_map = IndexMap::build(&resolved, &layout, false);

    let output = InspectOutput {
        model: model.name.clone(),
        coordinates: resolved.coordinates.clone(),
        contacts: resolved
            .contacts
            .iter()
            .map(|c| ContactSummary {
                name: c.name.clone(),
                body: c.body.clone(),
                side: classify_side(&c.name),
            })
            .collect(),
        index_map,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Model: {}", output.model);
    println!(
        "  Inputs: {}  Outputs: {}",
        output.index_map.n_inputs, output.index_map.n_outputs
    );
    println!("  Coordinates ({}):", output.coordinates.len());
    for name in &output.coordinates {
        if let Some(offsets) = output.index_map.coordinates.get(name) {
            println!(
                "    {:<24} q={:<3} qdot={:<3} qddot={}",
                name, offsets.position, offsets.velocity, offsets.acceleration
            );
        }
    }
    if !output.contacts.is_empty() {
        println!("  Contacts ({}):", output.contacts.len());
        for contact in &output.contacts {
            let side = contact.side.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
            println!("    {:<24} {:<16} {}", contact.name, contact.body, side);
        }
    }
    Ok(())
}

fn model_stem(model: &Path) -> anyhow::Result<String> {
    model
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .with_context(|| format!("cannot derive a job name from '{}'", model.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["ad-forge", "generate", "models/gait2d.yaml"]).expect("should parse");
        match cli.command {
            Commands::Generate(args) => {
                assert!(!args.no_dll);
                assert!(!args.json);
                let job = args.into_job().unwrap();
                assert_eq!(job.output_filename, "gait2d");
                assert_eq!(job.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
                assert_eq!(job.layout, FunctionLayout::default());
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_generate_with_layout_options() {
        let cli = Cli::try_parse_from([
            "ad-forge",
            "gen",
            "model.yaml",
            "-n",
            "leg",
            "-o",
            "out",
            "--no-dll",
            "--export-grfs",
            "--coordinates-order",
            "q2,q1",
            "--body-force",
            "pelvis",
            "--body-force",
            "torso",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Generate(args) => {
                let job = args.into_job().unwrap();
                assert_eq!(job.output_filename, "leg");
                assert!(job.no_dll);
                assert!(job.layout.export_grfs);
                assert_eq!(
                    job.layout.coordinates_order,
                    Some(vec!["q2".to_string(), "q1".to_string()])
                );
                assert_eq!(job.layout.body_forces, vec!["pelvis", "torso"]);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_generate_requires_model_or_job_file() {
        let cli = Cli::try_parse_from(["ad-forge", "generate"]).expect("should parse");
        match cli.command {
            Commands::Generate(args) => assert!(args.into_job().is_err()),
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_job_file_overridden_by_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let job_file = dir.path().join("job.yaml");
        std::fs::write(
            &job_file,
            "model_path: model.yaml\noutput_dir: out\noutput_filename: gait\nexport_grfs: true\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "ad-forge",
            "generate",
            "--job-file",
            job_file.to_str().unwrap(),
            "-n",
            "gait3d",
            "--export-grms",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Generate(args) => {
                let job = args.into_job().unwrap();
                assert_eq!(job.model_path, PathBuf::from("model.yaml"));
                assert_eq!(job.output_filename, "gait3d");
                assert!(job.layout.export_grfs);
                assert!(job.layout.export_grms);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_clean_command() {
        let cli = Cli::try_parse_from(["ad-forge", "clean", "--job", "gait", "--json"]).expect("should parse");
        match cli.command {
            Commands::Clean(args) => {
                assert_eq!(args.job.as_deref(), Some("gait"));
                assert!(args.json);
                assert!(args.work_root.is_none());
            }
            _ => panic!("Expected Clean command"),
        }
    }

    #[test]
    fn test_clean_job_help_mentions_unique_dirs() {
        let command = Cli::command();
        let clean = command.find_subcommand("clean").expect("clean subcommand");
        let job = clean
            .get_arguments()
            .find(|a| a.get_id() == "job")
            .expect("job argument");
        let help = job.get_help().expect("job help").to_string();
        assert!(help.contains("exactly"), "{help}");
        assert!(help.contains("NAME-<8 hex digits>"), "{help}");
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["ad-forge", "inspect", "m.yaml", "--log-level", "debug"]).expect("should parse");
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Inspect(_)));
    }
}
