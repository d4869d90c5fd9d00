//! Word-count pipeline: split a text file into chunks, count words across
//! all chunks in one task, sum the per-chunk counts in a third. Shared by
//! the standalone `wordcount-demo` binary and the main CLI's `run --demo`
//! subcommand — both link this module in via `#[path]` so its
//! `register_task!` calls land in whichever binary's own process registry.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use taskflow::config::ConfigMap;
use taskflow::handle::handle_marker;
use taskflow::task::{TaskArgs, TaskContext};
use taskflow::{register_task, Workflow};

fn split_file(args: TaskArgs, ctx: &TaskContext) -> anyhow::Result<Value> {
    let input_file = args
        .get(0)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("split_file expects a path as its first argument"))?;
    let num_parts = args.get(1).and_then(Value::as_u64).unwrap_or(2).max(1) as usize;

    let lines: Vec<String> = std::fs::read_to_string(input_file)?.lines().map(str::to_string).collect();
    let chunk_size = lines.len().div_ceil(num_parts).max(1);

    let mut parts = Vec::new();
    for (i, chunk) in lines.chunks(chunk_size).enumerate() {
        let part_path = ctx.work_dir.join(format!("part_{i:04}.txt"));
        std::fs::write(&part_path, chunk.join("\n"))?;
        parts.push(json!(part_path.to_string_lossy()));
    }
    Ok(Value::Array(parts))
}
register_task!(split_file);

/// Word-count every chunk path in `file_paths`, returning one count per
/// chunk in the same order. Each chunk is symlinked into this task's own
/// work dir first, the same input-linking path a file-producing task uses
/// to expose an ancestor's output without copying it.
fn run_word_count_on_list(args: TaskArgs, ctx: &TaskContext) -> anyhow::Result<Value> {
    let file_paths = args
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("run_word_count_on_list expects an array of file paths"))?;

    std::fs::create_dir_all(&ctx.work_dir)?;

    let mut counts = Vec::with_capacity(file_paths.len());
    for (i, path) in file_paths.iter().enumerate() {
        let path = path
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("run_word_count_on_list: element {i} is not a path string"))?;

        let part_dir = ctx.work_dir.join(format!("part_{i:04}"));
        std::fs::create_dir_all(&part_dir)?;
        let link = taskflow::link::link_input(Path::new(path), &part_dir, "input_split")?;

        let command_log = part_dir.join(".command.sh");
        let command = format!("wc -w < {}", shell_quote(&link.to_string_lossy()));
        let output = taskflow::shell::run_shell(&command, Some(&part_dir), Some(&command_log))?;

        let count: u64 = output.trim().parse().unwrap_or(0);
        counts.push(json!(count));
    }
    Ok(Value::Array(counts))
}
register_task!(run_word_count_on_list);

fn sum_counts(args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
    let counts = args
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("sum_counts expects an array of counts"))?;
    let total: u64 = counts.iter().filter_map(Value::as_u64).sum();
    Ok(json!(total))
}
register_task!(sum_counts);

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Build and run the three-stage pipeline against `input_file`, returning
/// its total word count.
pub async fn run(root_dir: impl Into<std::path::PathBuf>, input_file: &str, num_parts: u64, config: ConfigMap) -> anyhow::Result<u64> {
    let workflow = Workflow::new(root_dir, 4, config);
    workflow.register("split_file");
    workflow.register("run_word_count_on_list");
    workflow.register("sum_counts");

    let split = workflow.task("split_file", vec![json!(input_file), json!(num_parts)], BTreeMap::new())?;
    let counted = workflow.task(
        "run_word_count_on_list",
        vec![handle_marker(split.fingerprint())],
        BTreeMap::new(),
    )?;
    let total = workflow.task("sum_counts", vec![handle_marker(counted.fingerprint())], BTreeMap::new())?;

    let result = workflow.run(&total).await?;
    let total = result.as_u64().unwrap_or(0);
    workflow.cleanup()?;
    Ok(total)
}
