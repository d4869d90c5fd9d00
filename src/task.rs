//! # Task functions and the process-wide registry
//!
//! Tasks run in isolated worker processes, not threads or closures — Rust
//! has no equivalent of Python's object pickling, so a task body can't be
//! shipped across the fork boundary as a value. Instead every task function
//! is registered once, by name, in a process-wide table built at binary
//! startup via [`inventory`], and a worker subprocess looks its function up
//! by that name after re-executing the same binary (see `worker.rs`).
//!
//! Every task function receives the same two arguments regardless of
//! whether it uses them: positional/keyword JSON args, and a
//! [`TaskContext`]. There is no reflection-based signature inspection in
//! Rust the way the original engine used `inspect.signature`, so reserved
//! parameters are simply always present — a task that doesn't care about
//! its working directory or config just ignores those fields.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Reserved context every task function receives alongside its declared
/// arguments: the directory it should do its work in, and the workflow's
/// configuration map.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub work_dir: PathBuf,
    pub config: crate::config::ConfigMap,
}

/// Arguments a worker passes to a task function: positional values in
/// order, and keyword values by name. Dependency placeholders have already
/// been resolved to their upstream task's output by the time a task
/// function sees them.
#[derive(Debug, Clone, Default)]
pub struct TaskArgs {
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
}

impl TaskArgs {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }
}

/// The signature every registered task function must have. `anyhow::Error`
/// rather than `EngineError` because task bodies are user code living
/// outside the engine's own error taxonomy — the worker wraps whatever
/// comes back into a `TaskError` with a captured backtrace.
pub type TaskFn = fn(TaskArgs, &TaskContext) -> anyhow::Result<Value>;

/// One entry in the process-wide task registry, submitted via
/// [`register_task!`]. Collected by `inventory` at program startup.
pub struct TaskRegistration {
    pub name: &'static str,
    pub func: TaskFn,
}

inventory::collect!(TaskRegistration);

/// Register a task function under its own identifier so worker subprocesses
/// can resolve it by name.
///
/// ```ignore
/// fn split_file(args: TaskArgs, ctx: &TaskContext) -> anyhow::Result<Value> {
///     // ...
///     Ok(serde_json::json!({ "parts": 4 }))
/// }
/// register_task!(split_file);
/// ```
#[macro_export]
macro_rules! register_task {
    ($func:ident) => {
        $crate::task::inventory::submit! {
            $crate::task::TaskRegistration {
                name: stringify!($func),
                func: $func,
            }
        }
    };
}

#[doc(hidden)]
pub use inventory;

/// Look up a registered task function by name. Returns `None` if no task
/// with that name was ever linked into this binary via
/// [`register_task!`].
pub fn lookup(name: &str) -> Option<TaskFn> {
    inventory::iter::<TaskRegistration>
        .into_iter()
        .find(|r| r.name == name)
        .map(|r| r.func)
}
