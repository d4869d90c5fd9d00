//! Standalone binary used only by the integration tests as the worker
//! target: it registers the same task set `tests/scheduler_integration.rs`
//! builds handles for, and does nothing but answer `__worker` requests.
//! `current_exe()` inside a `cargo test` binary resolves to the test
//! harness itself, which has no task registry of its own — tests point
//! `Workflow::with_worker_exe` at this binary instead.

use serde_json::{json, Value};
use taskflow::register_task;
use taskflow::task::{TaskArgs, TaskContext};

fn add(args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
    let a = args.get(0).and_then(Value::as_i64).unwrap_or(0);
    let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
    Ok(json!(a + b))
}
register_task!(add);

fn sum_list(args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
    let items = args.get(0).and_then(Value::as_array).cloned().unwrap_or_default();
    let total: i64 = items.iter().filter_map(Value::as_i64).sum();
    Ok(json!(total))
}
register_task!(sum_list);

fn always_fails(_args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
    anyhow::bail!("intentional test failure")
}
register_task!(always_fails);

fn writes_marker_file(args: TaskArgs, ctx: &TaskContext) -> anyhow::Result<Value> {
    std::fs::create_dir_all(&ctx.work_dir)?;
    let id = args.get(0).and_then(Value::as_str).unwrap_or("x");
    std::fs::write(ctx.work_dir.join("ran.txt"), id)?;
    Ok(json!(id))
}
register_task!(writes_marker_file);

fn main() -> anyhow::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("__worker") {
        return taskflow::worker::run_stdio();
    }
    eprintln!("this binary only answers __worker requests");
    std::process::exit(2);
}
