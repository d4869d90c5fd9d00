//! # Workflow
//!
//! The user-facing handle to a set of registered tasks. A `Workflow` never
//! runs anything on its own — calling a registered task through it only
//! builds a [`TaskHandle`], the way the original engine's `@workflow.task`
//! decorator turned a call into a lazy `TaskOutput`. Actual execution only
//! happens inside [`Workflow::run`], which builds the backward DAG for one
//! requested handle and hands it to the scheduler.

use crate::config::ConfigMap;
use crate::dag::Dag;
use crate::error::EngineError;
use crate::handle::TaskHandle;
use crate::registry::TaskRegistry;
use crate::scheduler;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A set of registered tasks sharing one root working directory and one
/// configuration.
pub struct Workflow {
    root_dir: PathBuf,
    max_workers: usize,
    config: ConfigMap,
    registry: Mutex<TaskRegistry>,
    handles: Mutex<BTreeMap<String, TaskHandle>>,
    /// Binary re-exec'd as `<worker_exe> __worker` for every task invocation.
    /// `None` means "resolve `std::env::current_exe()` at run time", which
    /// is correct for a normal pipeline binary; tests and embedding hosts
    /// that aren't themselves the worker-dispatching binary override this
    /// via [`Workflow::with_worker_exe`].
    worker_exe: Option<PathBuf>,
}

impl Workflow {
    pub fn new(root_dir: impl Into<PathBuf>, max_workers: usize, config: ConfigMap) -> Self {
        Self {
            root_dir: root_dir.into(),
            max_workers: max_workers.max(1),
            config,
            registry: Mutex::new(TaskRegistry::new()),
            handles: Mutex::new(BTreeMap::new()),
            worker_exe: None,
        }
    }

    /// Override which binary gets re-exec'd with `__worker` for each task
    /// invocation, instead of the default `std::env::current_exe()`.
    pub fn with_worker_exe(mut self, path: impl Into<PathBuf>) -> Self {
        self.worker_exe = Some(path.into());
        self
    }

    /// Register a task function by name. Idempotent.
    pub fn register(&self, name: impl Into<String>) {
        self.registry.lock().unwrap().register(name);
    }

    /// Build a (not yet executed) handle for a call to a registered task.
    pub fn task(&self, name: &str, positional: Vec<Value>, keyword: BTreeMap<String, Value>) -> Result<TaskHandle, EngineError> {
        let handle = self.registry.lock().unwrap().build(name, positional, keyword)?;
        self.handles
            .lock()
            .unwrap()
            .insert(handle.fingerprint().to_string(), handle.clone());
        Ok(handle)
    }

    /// Run everything `target` transitively depends on, and return its
    /// output. A dependency fingerprint that was never built on this
    /// workflow is logged and skipped rather than failing the run outright —
    /// the task that needed it simply never becomes ready, and the run
    /// fails through the normal incomplete-task reporting only if that
    /// subtree actually mattered for `target`.
    pub async fn run(&self, target: &TaskHandle) -> Result<Arc<Value>, EngineError> {
        let handles: std::collections::HashMap<String, TaskHandle> =
            self.handles.lock().unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let (dag, missing) = Dag::build(target, &handles);
        for fp in &missing {
            tracing::warn!(fingerprint = %fp, "dependency handle was never built on this workflow; skipping from traversal");
        }

        std::fs::create_dir_all(&self.root_dir).map_err(|e| EngineError::Io {
            path: self.root_dir.clone(),
            source: e,
        })?;

        let worker_exe = match &self.worker_exe {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| EngineError::Io {
                path: PathBuf::from("<current_exe>"),
                source: e,
            })?,
        };

        scheduler::run(&dag, &worker_exe, &self.root_dir, self.max_workers, self.config.as_map())
            .await
            .map_err(EngineError::from)
    }

    /// Remove the workflow's root working directory and everything under
    /// it — every task's work dir lives there.
    pub fn cleanup(&self) -> std::io::Result<()> {
        if self.root_dir.exists() {
            std::fs::remove_dir_all(&self.root_dir)?;
        }
        Ok(())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_task;
    use crate::task::{TaskArgs, TaskContext};

    fn add_one(args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
        let n = args.get(0).and_then(Value::as_i64).unwrap_or(0);
        Ok(Value::from(n + 1))
    }
    register_task!(add_one);

    fn sum_two(args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
        let a = args.get(0).and_then(Value::as_i64).unwrap_or(0);
        let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
        Ok(Value::from(a + b))
    }
    register_task!(sum_two);

    #[test]
    fn building_handle_for_unregistered_task_errors() {
        let dir = tempfile::tempdir().unwrap();
        let wf = Workflow::new(dir.path(), 2, ConfigMap::default());
        assert!(wf.task("add_one", vec![Value::from(1)], BTreeMap::new()).is_err());
    }

    #[test]
    fn building_handle_for_registered_task_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let wf = Workflow::new(dir.path(), 2, ConfigMap::default());
        wf.register("add_one");
        let h = wf.task("add_one", vec![Value::from(1)], BTreeMap::new()).unwrap();
        assert_eq!(h.function(), "add_one");
    }

    #[test]
    fn run_target_missing_dependency_proceeds_and_fails_via_workflow_error() {
        let dir = tempfile::tempdir().unwrap();
        let wf = Workflow::new(dir.path(), 2, ConfigMap::default());
        wf.register("sum_two");
        // Build a handle referencing a dependency fingerprint that was
        // never actually constructed through this workflow. The run should
        // not abort up front for this — it should actually attempt to
        // schedule, and only fail because `sum_two` itself can never
        // become ready.
        let dangling = crate::handle::handle_marker("0000000000");
        let target = wf.task("sum_two", vec![dangling, Value::from(1)], BTreeMap::new()).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = rt.block_on(wf.run(&target));
        assert!(matches!(result, Err(EngineError::Workflow(_))));
    }
}
