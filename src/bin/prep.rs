//! prep CLI - Command-line interface for trial-prep
//!
//! Commands:
//! - transform: Build the output table from the catalog and raw logs
//! - inspect: Parse and assemble without writing, then report
//! - doctor: Diagnose configuration and input paths
//! - columns: Print the output column order
//! - config: Print the effective configuration

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use trial_prep::config::PipelineConfig;
use trial_prep::pipeline::{discover_inputs, DatasetPipeline};
use trial_prep::report::RunReport;
use trial_prep::{PrepError, StimulusCatalog, PREP_VERSION, PRODUCER_NAME};

/// Environment variable holding the log filter
const LOG_ENV: &str = "TRIAL_PREP_LOG";

/// prep - Turn raw trial logs into an analysis-ready dataset
#[derive(Parser)]
#[command(name = "prep")]
#[command(version = PREP_VERSION)]
#[command(about = "Prepare listening-experiment responses for analysis", long_about = None)]
struct Cli {
    /// Log progress (info level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the output table from the catalog and raw logs
    Transform {
        #[command(flatten)]
        paths: PathArgs,

        /// Output CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and assemble without writing, then report per-file statistics
    Inspect {
        #[command(flatten)]
        paths: PathArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input paths
    Doctor {
        #[command(flatten)]
        paths: PathArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the output column order
    Columns {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        paths: PathArgs,
    },
}

#[derive(Args)]
struct PathArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stimulus workbook
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Directory holding the per-participant logs
    #[arg(short, long)]
    input_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PrepCliError> {
    match cli.command {
        Commands::Transform {
            paths,
            output,
            json,
        } => {
            let mut config = load_config(&paths)?;
            if let Some(output) = output {
                config.paths.output = output;
            }
            cmd_transform(config, json)
        }

        Commands::Inspect { paths, json } => cmd_inspect(load_config(&paths)?, json),

        Commands::Doctor { paths, json } => cmd_doctor(&paths, json),

        Commands::Columns { config } => {
            let config = match config {
                Some(path) => PipelineConfig::from_file(&path)?,
                None => PipelineConfig::default(),
            };
            for column in &config.assembly.columns {
                println!("{}", column);
            }
            Ok(())
        }

        Commands::Config { paths } => {
            print!("{}", load_config(&paths)?.to_toml_string()?);
            Ok(())
        }
    }
}

/// File configuration (or defaults) with command-line paths applied on top
fn load_config(paths: &PathArgs) -> Result<PipelineConfig, PrepCliError> {
    let mut config = match &paths.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(catalog) = &paths.catalog {
        config.paths.catalog = catalog.clone();
    }
    if let Some(input_dir) = &paths.input_dir {
        config.paths.input_dir = input_dir.clone();
    }
    Ok(config)
}

fn cmd_transform(config: PipelineConfig, json: bool) -> Result<(), PrepCliError> {
    let report = DatasetPipeline::new(config)?.run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn cmd_inspect(config: PipelineConfig, json: bool) -> Result<(), PrepCliError> {
    let report = DatasetPipeline::new(config)?.inspect()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Preparation Report");
    println!("==================");
    println!("Catalog lists: {}", report.catalog_lists.join(", "));
    println!("\nFiles:");
    for file in &report.files {
        let stats = &file.stats;
        println!(
            "  - {} (list {}, participant {}): {} extracted, {} demographic, {} malformed, {} unmatched",
            file.file,
            if file.list.is_empty() { "?" } else { file.list.as_str() },
            if file.participant.is_empty() { "?" } else { file.participant.as_str() },
            stats.emitted,
            stats.demographic,
            stats.malformed,
            stats.unmatched()
        );
    }

    println!("\nExtracted responses: {}", report.extracted());
    println!("Filtered by trial group: {}", report.assembly.filtered_rows);
    println!("Dropped unmatched: {}", report.dropped_unmatched);
    if let Some((min, max)) = report.trial_range {
        println!("Trial range after renumbering: {} - {}", min, max);
    }
    println!("Block distribution:");
    for (block, rows) in &report.blocks {
        println!("  Block {}: {} rows", block, rows);
    }

    match &report.output {
        Some(path) => println!("\nWrote {}", path.display()),
        None => println!("\nDry run, nothing written"),
    }
    println!("Total rows: {}", report.rows);
    println!("Columns:    {}", report.columns);
}

fn cmd_doctor(paths: &PathArgs, json: bool) -> Result<(), PrepCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, PREP_VERSION),
    });

    let config = match load_config(paths) {
        Ok(config) => Some(config),
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot load configuration: {}", CliError::from(e).message),
            });
            None
        }
    };

    if let Some(config) = config {
        match config.clone().compile() {
            Ok(_) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "Configuration valid".to_string(),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        }

        checks.push(check_catalog(&config));
        checks.push(check_inputs(&config));
        checks.push(check_output_dir(&config.paths.output));
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PREP_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("prep Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PrepCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_catalog(config: &PipelineConfig) -> DoctorCheck {
    match StimulusCatalog::load(&config.paths.catalog, &config.catalog) {
        Ok(catalog) if catalog.is_empty() => DoctorCheck {
            name: "catalog".to_string(),
            status: CheckStatus::Warning,
            message: "Catalog has no sheets".to_string(),
        },
        Ok(catalog) => DoctorCheck {
            name: "catalog".to_string(),
            status: CheckStatus::Ok,
            message: format!("Lists: {}", catalog.list_ids().join(", ")),
        },
        Err(e) => DoctorCheck {
            name: "catalog".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

fn check_inputs(config: &PipelineConfig) -> DoctorCheck {
    match discover_inputs(&config.paths.input_dir, &config.paths.input_glob) {
        Ok(files) => DoctorCheck {
            name: "inputs".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} input logs", files.len()),
        },
        Err(e) => DoctorCheck {
            name: "inputs".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

fn check_output_dir(output: &Path) -> DoctorCheck {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => DoctorCheck {
            name: "output".to_string(),
            status: CheckStatus::Ok,
            message: format!("Output directory {} exists", dir.display()),
        },
        _ => DoctorCheck {
            name: "output".to_string(),
            status: CheckStatus::Warning,
            message: format!("Output directory {} does not exist", dir.display()),
        },
    }
}

// Error types

#[derive(Debug)]
enum PrepCliError {
    Prep(PrepError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<PrepError> for PrepCliError {
    fn from(e: PrepError) -> Self {
        PrepCliError::Prep(e)
    }
}

impl From<serde_json::Error> for PrepCliError {
    fn from(e: serde_json::Error) -> Self {
        PrepCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PrepCliError> for CliError {
    fn from(e: PrepCliError) -> Self {
        match e {
            PrepCliError::Prep(e) => {
                let (code, hint) = match &e {
                    PrepError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    PrepError::Csv(_) => ("CSV_ERROR", "Check the raw log is a valid CSV export"),
                    PrepError::Catalog { .. } => {
                        ("CATALOG_ERROR", "Check the stimulus workbook path and format")
                    }
                    PrepError::Config(_) | PrepError::ConfigFile(_) | PrepError::Pattern { .. } => {
                        ("CONFIG_ERROR", "Run 'prep config' to see the effective configuration")
                    }
                    PrepError::NoInputFiles { .. } => {
                        ("NO_INPUTS", "Check --input-dir and paths.input_glob")
                    }
                    PrepError::UnmatchedResponses { .. } => (
                        "UNMATCHED_RESPONSES",
                        "Run 'prep inspect' for per-file counts, or set unmatched = \"warn\"",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PrepCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PrepCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
