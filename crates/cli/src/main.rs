//! readflow - align, sort and copy paired-end reads
//!
//! Composition root: loads configuration, installs logging, wires the
//! adapters into the pipeline and renders the results.

mod logging;
mod render;
mod settings;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use readflow_core::application::constants::{ASSEMBLE_AND_SORT_WORKFLOW, PROCESS_READS_WORKFLOW};
use readflow_core::application::{
    default_registry, shutdown_channel, Pipeline, PipelineConfig, RetryPolicy, StepExecutor,
    WorkflowRegistry,
};
use readflow_core::domain::{parse_samples, Sample};
use readflow_core::port::id_provider::UuidProvider;
use readflow_core::port::time_provider::SystemTimeProvider;
use readflow_infra_system::{LocalObjectStore, SubprocessRunner};

use crate::logging::LogFormat;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "readflow")]
#[command(about = "Assemble and sort paired-end sequencing reads", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true, env = "READFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, env = "READFLOW_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow over a set of samples
    #[command(group(
        ArgGroup::new("input")
            .required(true)
            .args(["samples", "sample", "launch_plan"])
    ))]
    Run {
        /// JSON file with an array of {"read1": .., "read2": ..} samples
        #[arg(long)]
        samples: Option<PathBuf>,

        /// One sample as two read files (paths or URIs); repeatable
        #[arg(long, num_args = 2, value_names = ["READ1", "READ2"])]
        sample: Vec<String>,

        /// Use the inputs of a registered launch plan (e.g. "Test Data")
        #[arg(long)]
        launch_plan: Option<String>,

        /// Workflow to run
        #[arg(long, value_enum, default_value = "assemble-and-sort")]
        workflow: WorkflowChoice,

        /// Print the commands that would run without executing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show workflow metadata, steps and their command templates
    Describe,

    /// Write the registration manifest as JSON
    Register {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered launch plans
    Plans,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WorkflowChoice {
    AssembleAndSort,
    ProcessReads,
}

impl WorkflowChoice {
    fn name(self) -> &'static str {
        match self {
            WorkflowChoice::AssembleAndSort => ASSEMBLE_AND_SORT_WORKFLOW,
            WorkflowChoice::ProcessReads => PROCESS_READS_WORKFLOW,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = settings::load(cli.config.as_deref())?;

    // 2. Initialize logging
    let _log_guard = logging::init(cli.log_format, config.log_dir.as_deref())?;
    info!(version = VERSION, "readflow starting");

    let registry = default_registry(&config)?;

    match cli.command {
        Commands::Run {
            samples,
            sample,
            launch_plan,
            workflow,
            dry_run,
        } => {
            let samples = resolve_samples(&registry, samples, &sample, launch_plan.as_deref())?;
            run(&config, workflow, samples, dry_run).await?;
        }

        Commands::Describe => {
            if let Some(metadata) = registry
                .workflow(ASSEMBLE_AND_SORT_WORKFLOW)
                .and_then(|wf| wf.metadata.as_ref())
            {
                render::metadata(metadata);
                println!();
            }

            println!("{}", "Steps".cyan().bold());
            render::steps(registry.steps());
            println!();

            println!("{}", "Workflows".cyan().bold());
            let workflows: Vec<_> = [PROCESS_READS_WORKFLOW, ASSEMBLE_AND_SORT_WORKFLOW]
                .iter()
                .filter_map(|name| registry.workflow(name))
                .collect();
            render::workflows(&workflows);
        }

        Commands::Register { output } => {
            let json = registry.manifest().to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "{}",
                        format!("✓ Manifest written to {}", path.display()).green().bold()
                    );
                }
                None => println!("{}", json),
            }
        }

        Commands::Plans => {
            render::launch_plans(registry.launch_plans());
        }
    }

    Ok(())
}

/// Samples from exactly one of: a JSON file, `--sample` pairs, a launch plan
fn resolve_samples(
    registry: &WorkflowRegistry,
    file: Option<PathBuf>,
    pairs: &[String],
    launch_plan: Option<&str>,
) -> Result<Vec<Sample>> {
    if let Some(path) = file {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read samples file {}", path.display()))?;
        return parse_samples(&json)
            .with_context(|| format!("Invalid samples file {}", path.display()));
    }

    if let Some(name) = launch_plan {
        let plan = registry.launch_plan(name)?;
        return Ok(plan.inputs.samples.clone());
    }

    pairs
        .chunks(2)
        .enumerate()
        .map(|(index, pair)| match pair {
            [read1, read2] => Sample::from_strs(read1, read2)
                .with_context(|| format!("Invalid --sample #{}", index + 1)),
            _ => anyhow::bail!("--sample takes two read files"),
        })
        .collect()
}

async fn run(
    config: &PipelineConfig,
    workflow: WorkflowChoice,
    samples: Vec<Sample>,
    dry_run: bool,
) -> Result<()> {
    // Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let runner = Arc::new(SubprocessRunner::new(
        time_provider.clone(),
        config.env_allowlist.clone(),
    ));
    let store = Arc::new(LocalObjectStore::new(&config.store_root));

    let executor = StepExecutor::new(
        runner,
        store,
        RetryPolicy::new(config.retry_base_delay_ms),
        time_provider,
        id_provider.clone(),
    )
    .with_max_attempts(config.max_attempts)
    .with_timeout(config.step_timeout())
    .with_dry_run(dry_run);

    let pipeline = Pipeline::new(config, executor, id_provider);

    let (shutdown_tx, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, cancelling run");
            shutdown_tx.shutdown();
        }
    });

    info!(
        workflow = workflow.name(),
        samples = samples.len(),
        dry_run,
        "Starting workflow"
    );

    let summary = match workflow {
        WorkflowChoice::AssembleAndSort => pipeline.assemble_and_sort(&samples, &shutdown).await,
        WorkflowChoice::ProcessReads => pipeline.process_reads(&samples, &shutdown).await,
    }
    .with_context(|| format!("Workflow {} failed", workflow.name()))?;

    render::run_summary(&summary, dry_run);
    Ok(())
}
