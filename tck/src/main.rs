//! hubs-tck - conformance runner for the Blender glTF exporter
//!
//! # Usage
//!
//! ```bash
//! # Full pipeline against the default Blender install
//! hubs-tck run
//!
//! # Two Blender versions, glTF and GLB, JUnit output
//! hubs-tck run --tool /opt/blender-3.6/blender --tool /opt/blender-4.1/blender \
//!     --variant "=" --variant "_glb=--glb" --format junit --report results.xml
//!
//! # Inspect a single artifact
//! hubs-tck validate tests_out/outblender/export/audio.gltf
//! hubs-tck check tests_out/outblender/export/audio.gltf --scenario audio
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use hubs_tck::config::{HarnessConfig, ToolTarget, Variant};
use hubs_tck::driver::ProcessDriver;
use hubs_tck::report::RunReport;
use hubs_tck::scenarios::{Harness, ScenarioSet};
use hubs_tck::validator::StructuralValidator;

/// Hubs TCK - conformance runner for the Blender glTF exporter
#[derive(Parser)]
#[command(name = "hubs-tck")]
#[command(about = "Hubs TCK - conformance runner for the Blender glTF exporter")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where scenarios come from
#[derive(clap::Args)]
struct ScenarioSource {
    /// Load scenarios from this directory instead of a built-in set
    #[arg(long)]
    scenarios_dir: Option<PathBuf>,

    /// Built-in fixture set
    #[arg(long)]
    fixture_set: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export, validate, assert and roundtrip every scenario
    Run {
        /// Authoring tool executable, repeatable
        #[arg(long = "tool")]
        tools: Vec<PathBuf>,

        /// Export variant as SUFFIX=ARGS, repeatable
        #[arg(long = "variant")]
        variants: Vec<String>,

        /// Root directory for generated artifacts
        #[arg(long)]
        out_prefix: Option<PathBuf>,

        /// Directory holding the authored scenes
        #[arg(long)]
        scenes_dir: Option<PathBuf>,

        #[command(flatten)]
        source: ScenarioSource,

        /// Run only the named scenario, repeatable
        #[arg(long)]
        only: Vec<String>,

        /// Skip the roundtrip phase
        #[arg(long)]
        skip_roundtrip: bool,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the report to this file instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the scenarios of the selected set
    List {
        #[command(flatten)]
        source: ScenarioSource,
    },
    /// Run the structural validator on an artifact
    Validate {
        /// Artifact path
        artifact: PathBuf,
    },
    /// Check one scenario's expectations against an existing artifact
    Check {
        /// Artifact path
        artifact: PathBuf,

        /// Scenario name
        #[arg(long)]
        scenario: String,

        #[command(flatten)]
        source: ScenarioSource,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Junit,
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    if let Ok(prefix) = std::env::var("OUT_PREFIX") {
        config.out_prefix = PathBuf::from(prefix);
    }
    Ok(config)
}

fn apply_source(config: &mut HarnessConfig, source: ScenarioSource) {
    if let Some(dir) = source.scenarios_dir {
        config.scenarios_dir = Some(dir);
    }
    if let Some(set) = source.fixture_set {
        config.fixture_set = set;
    }
}

fn render(report: &RunReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => report.render_summary(),
        OutputFormat::Json => report.to_json(),
        OutputFormat::Junit => report.to_junit_xml(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn execute_run(
    mut config: HarnessConfig,
    tools: Vec<PathBuf>,
    variants: Vec<String>,
    out_prefix: Option<PathBuf>,
    scenes_dir: Option<PathBuf>,
    only: Vec<String>,
    skip_roundtrip: bool,
    format: OutputFormat,
    report_path: Option<PathBuf>,
) -> Result<ExitCode> {
    if !tools.is_empty() {
        config.tools = tools.into_iter().map(ToolTarget::from_executable).collect();
    }
    if !variants.is_empty() {
        config.variants = variants.iter().map(|v| Variant::parse(v)).collect();
    }
    if let Some(prefix) = out_prefix {
        config.out_prefix = prefix;
    }
    if let Some(dir) = scenes_dir {
        config.scenes_dir = dir;
    }

    let scenarios = ScenarioSet::from_config(&config)?.select(&only)?;
    let runner = Arc::new(ProcessDriver::from_config(&config));
    let harness = Harness::new(config, scenarios, runner)?.with_roundtrip(!skip_roundtrip);

    let report = harness.run().await;
    match report_path {
        Some(path) => {
            std::fs::write(&path, render(&report, format))
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            info!("Report written to {}", path.display());
            report.print_summary();
        }
        None => match format {
            OutputFormat::Text => report.print_summary(),
            other => println!("{}", render(&report, other)),
        },
    }

    Ok(if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn execute_list(config: &HarnessConfig) -> Result<ExitCode> {
    let scenarios = ScenarioSet::from_config(config)?;
    for scenario in scenarios.iter() {
        println!("{:<28} {}", scenario.name(), scenario.description());
    }
    Ok(ExitCode::SUCCESS)
}

async fn execute_validate(config: &HarnessConfig, artifact: &Path) -> Result<ExitCode> {
    let validator = StructuralValidator::from_config(config);
    let report = validator.validate(artifact).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn execute_check(config: HarnessConfig, artifact: &Path, name: &str) -> Result<ExitCode> {
    let scenarios = ScenarioSet::from_config(&config)?.select(&[name.to_string()])?;
    let runner = Arc::new(ProcessDriver::from_config(&config));
    let harness = Harness::new(config, scenarios, runner)?;
    let scenario = harness
        .scenarios()
        .get(name)
        .with_context(|| format!("Unknown scenario: {}", name))?;

    harness.check_artifact(scenario, artifact).await?;
    println!("PASS {} ({})", name, artifact.display());
    Ok(ExitCode::SUCCESS)
}

/// Run the application
async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Run {
            tools,
            variants,
            out_prefix,
            scenes_dir,
            source,
            only,
            skip_roundtrip,
            format,
            report,
        } => {
            apply_source(&mut config, source);
            execute_run(
                config,
                tools,
                variants,
                out_prefix,
                scenes_dir,
                only,
                skip_roundtrip,
                format,
                report,
            )
            .await
        }
        Commands::List { source } => {
            apply_source(&mut config, source);
            execute_list(&config)
        }
        Commands::Validate { artifact } => execute_validate(&config, &artifact).await,
        Commands::Check {
            artifact,
            scenario,
            source,
        } => {
            apply_source(&mut config, source);
            execute_check(config, &artifact, &scenario).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
