//! # Registry and handle construction
//!
//! Registering a task with a [`Workflow`](crate::workflow::Workflow) never
//! runs it — it only records the function's name so later calls through
//! that name can be validated, and hands back a factory closure that turns
//! arguments into a [`TaskHandle`]. Building a handle is pure bookkeeping:
//! no process is spawned and no result exists until the scheduler actually
//! runs the DAG.
//!
//! Registration is idempotent by name, mirroring the original engine's
//! `@workflow.task` decorator: registering the same function twice (for
//! example because a module defining tasks is imported more than once)
//! is a no-op, not an error.

use crate::error::EngineError;
use crate::handle::TaskHandle;
use crate::task;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Tracks which task names a particular [`Workflow`](crate::workflow::Workflow)
/// has registered, and builds [`TaskHandle`]s on request.
///
/// Registration here is separate from the process-wide [`task::lookup`]
/// table: a name must be present in *both* — known to this workflow, and
/// linked into the binary via [`register_task!`](crate::register_task) —
/// before a handle can be built for it. This catches the common mistake of
/// building a handle for a task the workflow never registered, before a
/// single worker process is spawned.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    registered: HashSet<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task name. Idempotent — registering twice is a no-op.
    pub fn register(&mut self, name: impl Into<String>) {
        self.registered.insert(name.into());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.contains(name)
    }

    /// Build a handle for a call to `name`, failing if the workflow never
    /// registered it or if no worker-linked function answers to that name.
    pub fn build(
        &self,
        name: &str,
        positional: Vec<Value>,
        keyword: BTreeMap<String, Value>,
    ) -> Result<TaskHandle, EngineError> {
        if !self.registered.contains(name) {
            return Err(EngineError::Other(format!(
                "task '{name}' was never registered on this workflow"
            )));
        }
        if task::lookup(name).is_none() {
            return Err(EngineError::Other(format!(
                "task '{name}' is registered but no function answers to that name; \
                 did you forget register_task!({name})?"
            )));
        }
        Ok(TaskHandle::new(name, positional, keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_task;
    use crate::task::{TaskArgs, TaskContext};
    use serde_json::json;

    fn noop_task(_args: TaskArgs, _ctx: &TaskContext) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }
    register_task!(noop_task);

    #[test]
    fn registering_twice_is_idempotent() {
        let mut reg = TaskRegistry::new();
        reg.register("noop_task");
        reg.register("noop_task");
        assert!(reg.is_registered("noop_task"));
    }

    #[test]
    fn build_succeeds_for_registered_and_linked_task() {
        let mut reg = TaskRegistry::new();
        reg.register("noop_task");
        let handle = reg.build("noop_task", vec![json!(1)], BTreeMap::new()).unwrap();
        assert_eq!(handle.function(), "noop_task");
    }

    #[test]
    fn build_fails_for_unregistered_task() {
        let reg = TaskRegistry::new();
        assert!(reg.build("noop_task", vec![], BTreeMap::new()).is_err());
    }

    #[test]
    fn build_fails_for_registered_but_unlinked_task() {
        let mut reg = TaskRegistry::new();
        reg.register("nonexistent_linked_fn");
        assert!(reg.build("nonexistent_linked_fn", vec![], BTreeMap::new()).is_err());
    }

    #[test]
    fn identical_calls_produce_handles_with_same_fingerprint() {
        let mut reg = TaskRegistry::new();
        reg.register("noop_task");
        let a = reg.build("noop_task", vec![json!(7)], BTreeMap::new()).unwrap();
        let b = reg.build("noop_task", vec![json!(7)], BTreeMap::new()).unwrap();
        assert_eq!(a, b);
    }
}
