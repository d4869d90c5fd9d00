//! Standalone entry point for the word-count pipeline demo. The task
//! bodies and the `run()` driver live in `wordcount_tasks.rs`, shared with
//! the `taskflow run --demo wordcount` subcommand in `src/main.rs`.

#[path = "wordcount_tasks.rs"]
mod wordcount_tasks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The scheduler re-execs this same binary for every task invocation,
    // passing "__worker" as argv[1]. Handle that before anything else.
    if std::env::args().nth(1).as_deref() == Some("__worker") {
        return taskflow::worker::run_stdio();
    }

    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mut args = std::env::args().skip(1);
    let input_file = args.next().unwrap_or_else(|| "demos/sample.txt".to_string());
    let num_parts: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(3);
    let config = match args.next() {
        Some(path) => taskflow::config::ConfigMap::load(std::path::Path::new(&path))?,
        None => taskflow::config::ConfigMap::default(),
    };

    let root_dir = std::env::temp_dir().join("taskflow-wordcount-demo");
    let total = wordcount_tasks::run(root_dir, &input_file, num_parts, config).await?;
    println!("total word count: {total}");
    Ok(())
}
