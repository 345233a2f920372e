//! CLI binary for validating, inspecting, and running Gantry pipelines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use gantry_pipeline::{
    plan_run, validate, MemoryStore, Orchestrator, PipelineDoc, PipelineGraph, RunEvent, Severity,
};
use gantry_runner::{RunnerConfig, ScriptEvent, ScriptRunner};
use gantry_types::RunStatus;

#[derive(Parser)]
#[command(name = "gantry", version, about = "Compile visual ML pipelines to Python and run them supervised")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a .json document
    Run {
        /// Path to the pipeline .json file
        pipeline: PathBuf,

        /// Dataset path, overriding the data loader's configured path
        #[arg(short, long)]
        data: Option<String>,

        /// Working directory for scripts and artifacts (default: current)
        #[arg(short, long)]
        workdir: Option<PathBuf>,

        /// Python interpreter to use (default: auto-detect)
        #[arg(short, long)]
        python: Option<PathBuf>,
    },

    /// Validate a pipeline .json file
    Validate {
        /// Path to the pipeline .json file
        pipeline: PathBuf,
    },

    /// Show information about a pipeline and its planned stages
    Info {
        /// Path to the pipeline .json file
        pipeline: PathBuf,
    },

    /// Print the generated program for one planned stage
    Codegen {
        /// Path to the pipeline .json file
        pipeline: PathBuf,

        /// Stage name (split, train, tune, load, evaluate, export, explain)
        #[arg(short, long)]
        stage: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { pipeline, data, workdir, python } => {
            cmd_run(&pipeline, data.as_deref(), workdir.as_deref(), python.as_deref()).await?;
        }
        Commands::Validate { pipeline } => {
            cmd_validate(&pipeline)?;
        }
        Commands::Info { pipeline } => {
            cmd_info(&pipeline)?;
        }
        Commands::Codegen { pipeline, stage } => {
            cmd_codegen(&pipeline, &stage)?;
        }
    }

    Ok(())
}

fn load_pipeline(path: &Path) -> anyhow::Result<PipelineGraph> {
    let source = std::fs::read_to_string(path)?;
    let doc: PipelineDoc = serde_json::from_str(&source)?;
    Ok(PipelineGraph::from_doc(doc))
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let graph = load_pipeline(path)?;
    let diagnostics = validate(&graph);

    if diagnostics.is_empty() {
        println!("OK: no problems found");
        return Ok(());
    }
    let mut errors = 0;
    for diag in &diagnostics {
        let tag = match diag.severity {
            Severity::Error => {
                errors += 1;
                "error"
            }
            Severity::Warning => "warning",
        };
        println!("{tag}: [{}] {}", diag.rule, diag.message);
    }
    if errors > 0 {
        anyhow::bail!("{errors} validation error(s)");
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let graph = load_pipeline(path)?;
    println!("Pipeline: {}", graph.name);
    println!("Nodes:    {}", graph.all_nodes().count());
    println!("Edges:    {}", graph.all_edges().len());

    match plan_run(&graph) {
        Ok(plan) => {
            println!(
                "Split:    {}",
                if plan.precomputed_split { "precomputed" } else { "inline" }
            );
            println!("Stages:");
            for (i, stage) in plan.stages.iter().enumerate() {
                println!(
                    "  {}. {} (node '{}', {} lines)",
                    i + 1,
                    stage.kind.as_str(),
                    stage.node_id,
                    stage.script.lines().count()
                );
            }
        }
        Err(err) => println!("Not runnable: {err}"),
    }
    Ok(())
}

fn cmd_codegen(path: &Path, stage_name: &str) -> anyhow::Result<()> {
    let graph = load_pipeline(path)?;
    let plan = plan_run(&graph)?;
    let stage = plan
        .stages
        .iter()
        .find(|s| s.kind.as_str() == stage_name)
        .ok_or_else(|| {
            let available: Vec<_> = plan.stages.iter().map(|s| s.kind.as_str()).collect();
            anyhow::anyhow!(
                "no '{stage_name}' stage in this pipeline (available: {})",
                available.join(", ")
            )
        })?;
    print!("{}", stage.script);
    Ok(())
}

async fn cmd_run(
    path: &Path,
    data: Option<&str>,
    workdir: Option<&Path>,
    python: Option<&Path>,
) -> anyhow::Result<()> {
    let graph = load_pipeline(path)?;

    let interpreter = gantry_runner::find_python(python)?;
    tracing::info!(python = %interpreter.path.display(), version = %interpreter.version, "Using interpreter");

    let workdir = match workdir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let runner = ScriptRunner::new(RunnerConfig::python(interpreter.path, workdir));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(runner, store);

    // Print the event stream while the run progresses.
    let mut events = orchestrator.events().subscribe();
    let printer = tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(event) => {
                    print_event(&event);
                    if matches!(
                        event,
                        RunEvent::RunCompleted { .. }
                            | RunEvent::RunFailed { .. }
                            | RunEvent::RunCancelled { .. }
                    ) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("  ... {skipped} events skipped ...");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    gantry_pipeline::validate_or_raise(&graph)?;
    let mut plan = plan_run(&graph)?;
    if let Some(data) = data {
        plan.dataset_path = data.to_string();
    }
    let outcome = orchestrator.run_plan(&plan).await?;
    let _ = printer.await;

    match outcome.status {
        RunStatus::Completed => {
            println!("Run {} completed", outcome.run_id);
            Ok(())
        }
        RunStatus::Cancelled => {
            println!("Run {} cancelled", outcome.run_id);
            Ok(())
        }
        RunStatus::Failed => {
            anyhow::bail!(
                "run {} failed: {}",
                outcome.run_id,
                outcome.error.unwrap_or_else(|| "unknown error".into())
            )
        }
        RunStatus::Running => unreachable!("run returned while still running"),
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::RunStarted { pipeline_name, stage_count, .. } => {
            println!("Running '{pipeline_name}' ({stage_count} stages)");
        }
        RunEvent::StageStarted { stage, .. } => println!("--- {stage} ---"),
        RunEvent::StageCompleted { .. } => {}
        RunEvent::Script(script_event) => print_script_event(script_event),
        RunEvent::RunCompleted { duration_ms, .. } => {
            println!("Completed in {:.1}s", *duration_ms as f64 / 1000.0);
        }
        RunEvent::RunFailed { error, .. } => println!("Failed: {error}"),
        RunEvent::RunCancelled { .. } => println!("Cancelled"),
    }
}

fn print_script_event(event: &ScriptEvent) {
    match event {
        ScriptEvent::Log { message } => println!("  {message}"),
        ScriptEvent::Progress { current, total } => println!("  [{current}/{total}]"),
        ScriptEvent::Error { message } => eprintln!("  error: {message}"),
        ScriptEvent::Metrics { model_type, data } => {
            println!("  metrics ({model_type}): {data}");
        }
        ScriptEvent::Trial { trial_number, score, .. } => {
            println!("  trial #{trial_number}: score {score:.4}");
        }
        ScriptEvent::TuningComplete { best_score, total_trials, .. } => {
            println!("  tuning complete: best {best_score:.4} over {total_trials} trials");
        }
        ScriptEvent::ExplainProgress { stage, percent_complete } => {
            println!("  explain/{stage}: {percent_complete}%");
        }
        ScriptEvent::ExplainComplete { duration_ms } => {
            println!("  explain finished in {:.1}s", *duration_ms as f64 / 1000.0);
        }
        ScriptEvent::Complete | ScriptEvent::Exit { .. } => {}
        // Bulky payloads (SHAP matrices, curves) are for the UI, not stdout.
        ScriptEvent::FeatureImportance { .. }
        | ScriptEvent::ShapData { .. }
        | ScriptEvent::PartialDependence { .. }
        | ScriptEvent::ExplainMetadata { .. } => {}
    }
}
