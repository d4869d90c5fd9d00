//! # Worker entry point
//!
//! The child-process side of task execution. The scheduler spawns
//! `std::env::current_exe()` with the hidden `__worker` subcommand, writes a
//! [`WorkerRequest`] as one line of JSON to the child's stdin, and reads a
//! single [`WorkerResponse`] line back from its stdout. This is the
//! Rust-native substitute for the original engine's `ProcessPoolExecutor`
//! submission: there's no object pickling in Rust, so the function to run
//! is identified by name and resolved through the same process-wide
//! registry the worker binary itself linked in (see `task.rs`).
//!
//! A worker handles exactly one task invocation and exits. Panics inside a
//! task function are caught at this boundary and reported as a normal
//! failed [`WorkerResponse`] rather than taking the whole child process down
//! with a non-JSON exit.

use crate::config::ConfigMap;
use crate::task::{self, TaskArgs, TaskContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub function: String,
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
    pub work_dir: PathBuf,
    pub config: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerResponse {
    Completed { output: Value },
    Failed { message: String, traceback: String },
}

/// Run one task invocation described by `request`, never panicking out of
/// the caller's stack frame.
pub fn execute(request: WorkerRequest) -> WorkerResponse {
    let Some(func) = task::lookup(&request.function) else {
        return WorkerResponse::Failed {
            message: format!("no task function registered under name '{}'", request.function),
            traceback: String::new(),
        };
    };

    if let Err(e) = std::fs::create_dir_all(&request.work_dir) {
        return WorkerResponse::Failed {
            message: format!("failed to create work dir {}: {e}", request.work_dir.display()),
            traceback: String::new(),
        };
    }

    link_inputs(&request.positional, &request.keyword, &request.work_dir);

    let ctx = TaskContext {
        work_dir: request.work_dir,
        config: ConfigMap::new(request.config),
    };
    let args = TaskArgs {
        positional: request.positional,
        keyword: request.keyword,
    };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| func(args, &ctx)));

    match result {
        Ok(Ok(output)) => WorkerResponse::Completed { output },
        Ok(Err(e)) => WorkerResponse::Failed {
            message: e.to_string(),
            traceback: format!("{e:?}"),
        },
        Err(panic) => {
            let message = panic_message(&panic);
            WorkerResponse::Failed {
                message: format!("task panicked: {message}"),
                traceback: String::new(),
            }
        }
    }
}

/// Make every dependency-resolved path argument visible inside the task's
/// own work dir before `func` runs, at the same depth
/// `TaskHandle::dependencies` walks: top-level positional/keyword values,
/// and elements of a top-level array. A value that isn't a JSON string
/// naming a path that exists is left alone — most arguments are plain data,
/// not files, and this has to be silent about that.
fn link_inputs(positional: &[Value], keyword: &BTreeMap<String, Value>, work_dir: &Path) {
    for (i, value) in positional.iter().enumerate() {
        link_value(value, work_dir, &format!("input_p{i}"));
    }
    for (key, value) in keyword.iter() {
        link_value(value, work_dir, &format!("input_{key}"));
    }
}

fn link_value(value: &Value, work_dir: &Path, prefix: &str) {
    match value {
        Value::String(s) => try_link(s, work_dir, prefix),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if let Value::String(s) = item {
                    try_link(s, work_dir, &format!("{prefix}_{i}"));
                }
            }
        }
        _ => {}
    }
}

fn try_link(path_str: &str, work_dir: &Path, prefix: &str) {
    let path = Path::new(path_str);
    if !path.exists() {
        return;
    }
    if let Err(e) = crate::link::link_input(path, work_dir, prefix) {
        tracing::warn!(path = %path_str, error = %e, "failed to link input into task work dir");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Entry point for the `__worker` subcommand: read one [`WorkerRequest`] as
/// a JSON line from stdin, execute it, and write one [`WorkerResponse`] as a
/// JSON line to stdout.
pub fn run_stdio() -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;

    let request: WorkerRequest = serde_json::from_str(line.trim_end())?;
    let response = execute(request);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &response)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_task;

    fn ok_task(args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
        let n = args.get(0).and_then(Value::as_i64).unwrap_or(0);
        Ok(Value::from(n + 1))
    }
    register_task!(ok_task);

    fn failing_task(_args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
        anyhow::bail!("deliberately broken")
    }
    register_task!(failing_task);

    fn panicking_task(_args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
        panic!("boom");
    }
    register_task!(panicking_task);

    fn make_request(function: &str, positional: Vec<Value>, work_dir: PathBuf) -> WorkerRequest {
        WorkerRequest {
            function: function.to_string(),
            positional,
            keyword: BTreeMap::new(),
            work_dir,
            config: BTreeMap::new(),
        }
    }

    #[test]
    fn successful_task_completes() {
        let dir = tempfile::tempdir().unwrap();
        let req = make_request("ok_task", vec![Value::from(41)], dir.path().join("w"));
        match execute(req) {
            WorkerResponse::Completed { output } => assert_eq!(output, Value::from(42)),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn failing_task_reports_failed_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let req = make_request("failing_task", vec![], dir.path().join("w"));
        match execute(req) {
            WorkerResponse::Failed { message, .. } => assert!(message.contains("deliberately broken")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn panicking_task_is_caught() {
        let dir = tempfile::tempdir().unwrap();
        let req = make_request("panicking_task", vec![], dir.path().join("w"));
        match execute(req) {
            WorkerResponse::Failed { message, .. } => assert!(message.contains("boom")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn unknown_function_is_failed_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let req = make_request("not_a_real_task", vec![], dir.path().join("w"));
        match execute(req) {
            WorkerResponse::Failed { message, .. } => assert!(message.contains("not_a_real_task")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn work_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = dir.path().join("nested").join("work");
        let req = make_request("ok_task", vec![Value::from(1)], work_dir.clone());
        execute(req);
        assert!(work_dir.is_dir());
    }
}

impl std::fmt::Debug for WorkerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerResponse::Completed { output } => write!(f, "Completed({output})"),
            WorkerResponse::Failed { message, .. } => write!(f, "Failed({message})"),
        }
    }
}
