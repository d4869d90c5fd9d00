//! # taskflow CLI
//!
//! Three jobs live in this binary: a `run --demo` harness for the bundled
//! example pipelines, a `cleanup` maintenance command, and the hidden
//! `__worker` entry point the scheduler re-execs this binary under for
//! every task invocation (see `worker.rs`). The engine itself isn't
//! coupled to any one workflow definition — `run --demo` only dispatches
//! to the pipelines linked into this binary under `demos/`.

#[path = "../demos/wordcount_tasks.rs"]
mod wordcount_tasks;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use taskflow::error::FixSuggestion;

#[derive(Parser)]
#[command(name = "taskflow", version, about = "Parallel DAG workflow engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one of the bundled demo pipelines.
    Run {
        /// Name of the bundled demo to run.
        #[arg(long, default_value = "wordcount")]
        demo: String,
        /// Input file for the demo pipeline.
        #[arg(long)]
        input: PathBuf,
        /// Number of parallel chunks to split the input into.
        #[arg(long, default_value_t = 3)]
        parts: u64,
        /// Root working directory for the run; defaults to a temp dir.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Optional TOML config file, made available to tasks via `TaskContext::config`.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Remove a workflow's root working directory and everything under it.
    Cleanup {
        /// Root directory passed to `Workflow::new` when the run was started.
        root_dir: PathBuf,
    },
    /// Hidden worker entry point; the scheduler invokes this itself.
    #[command(hide = true, name = "__worker")]
    Worker,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Worker => taskflow::worker::run_stdio(),
        Commands::Cleanup { root_dir } => cleanup(&root_dir),
        Commands::Run { demo, input, parts, root, config } => run_demo(&demo, &input, parts, root, config),
    };

    if let Err(err) = result {
        eprintln!("{} {err}", "error:".red().bold());
        if let Some(hint) = fix_suggestion(&err) {
            eprintln!("  {} {hint}", "hint:".yellow());
        }
        std::process::exit(1);
    }
}

fn run_demo(demo: &str, input: &PathBuf, parts: u64, root: Option<PathBuf>, config: Option<PathBuf>) -> anyhow::Result<()> {
    if demo != "wordcount" {
        anyhow::bail!("unknown demo '{demo}'; the only bundled demo is 'wordcount'");
    }

    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let root_dir = root.unwrap_or_else(|| std::env::temp_dir().join("taskflow-wordcount-demo"));
    let input_str = input.to_string_lossy().into_owned();
    let config = match config {
        Some(path) => taskflow::config::ConfigMap::load(&path)?,
        None => taskflow::config::ConfigMap::default(),
    };

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let total = rt.block_on(wordcount_tasks::run(root_dir, &input_str, parts, config))?;
    println!("{} total word count: {total}", "ok:".green().bold());
    Ok(())
}

fn cleanup(root_dir: &PathBuf) -> anyhow::Result<()> {
    if root_dir.exists() {
        std::fs::remove_dir_all(root_dir)?;
        println!("{} removed {}", "ok:".green().bold(), root_dir.display());
    } else {
        println!("{} {} does not exist, nothing to do", "ok:".green().bold(), root_dir.display());
    }
    Ok(())
}

fn fix_suggestion(err: &anyhow::Error) -> Option<String> {
    err.downcast_ref::<taskflow::EngineError>()
        .and_then(FixSuggestion::fix_suggestion)
        .map(str::to_string)
}
