//! # Scheduler
//!
//! The event loop that actually runs a [`Dag`](crate::dag::Dag): a
//! readiness scan over pending tasks, bounded parallel submission to
//! worker subprocesses, and failure-triggered cancellation of descendants.
//! This is a direct translation of the original engine's
//! `ProcessPoolExecutor` + `concurrent.futures.wait(..., FIRST_COMPLETED)`
//! loop onto `tokio::task::JoinSet`, with a semaphore standing in for the
//! pool's fixed worker count.

use crate::dag::Dag;
use crate::error::{DependencyMissing, TaskSummary, WorkflowError};
use crate::handle::TaskStatus;
use crate::worker::{WorkerRequest, WorkerResponse};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Recorded outcome of one task invocation, kept around so descendants can
/// resolve their dependency arguments and so a failed run can report a
/// useful summary.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub output: Arc<Value>,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Shared, lock-free state for one run: status and outcome per fingerprint.
/// Mirrors the shape of a `DataStore`, but keyed by task fingerprint rather
/// than a user-chosen task id, and split into two maps since a task's
/// status can change (Pending -> Running -> Cancelled) before it ever has
/// an outcome.
pub struct RunState {
    pub status: DashMap<String, TaskStatus>,
    pub outcomes: DashMap<String, TaskOutcome>,
}

impl RunState {
    fn new(dag: &Dag) -> Self {
        let status = DashMap::new();
        for fp in dag.nodes.keys() {
            status.insert(fp.clone(), TaskStatus::Pending);
        }
        Self {
            status,
            outcomes: DashMap::new(),
        }
    }
}

/// Run every task in `dag`, returning the terminal task's output on
/// success.
#[instrument(skip(dag, worker_exe, root_dir), fields(tasks = dag.len(), max_workers))]
pub async fn run(
    dag: &Dag,
    worker_exe: &Path,
    root_dir: &Path,
    max_workers: usize,
    config: &BTreeMap<String, Value>,
) -> Result<Arc<Value>, WorkflowError> {
    let state = RunState::new(dag);
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut in_flight: JoinSet<(String, std::io::Result<WorkerResponse>, Duration)> = JoinSet::new();
    let mut submitted: HashSet<String> = HashSet::new();

    loop {
        let target_status = *state.status.get(&dag.target).expect("target always in status map");
        if target_status.is_terminal() && in_flight.is_empty() {
            break;
        }

        for fp in ready_tasks(dag, &state, &submitted) {
            let permit = match Arc::clone(&semaphore).try_acquire_owned() {
                Ok(p) => p,
                Err(_) => break,
            };
            submitted.insert(fp.clone());
            state.status.insert(fp.clone(), TaskStatus::Running);

            let handle = dag.nodes.get(&fp).expect("ready fingerprint must be a dag node").clone();
            let work_dir = root_dir.join(handle.function()).join(&fp);
            let config = config.clone();

            let (positional, keyword) = match resolve_args(&handle, &state) {
                Ok(resolved) => resolved,
                Err(dep_missing) => {
                    warn!(%dep_missing, "dependency missing while resolving task arguments");
                    state.status.insert(fp.clone(), TaskStatus::Failed);
                    state.outcomes.insert(
                        fp.clone(),
                        TaskOutcome {
                            output: Arc::new(Value::Null),
                            duration: Duration::ZERO,
                            error: Some(dep_missing.to_string()),
                        },
                    );
                    cancel_descendants(dag, &state, &fp);
                    continue;
                }
            };

            let function = handle.function().to_string();
            let worker_exe = worker_exe.to_path_buf();
            in_flight.spawn(async move {
                let _permit = permit;
                let started = Instant::now();
                let result = spawn_worker(&worker_exe, &function, positional, keyword, work_dir, config).await;
                (fp, result, started.elapsed())
            });
        }

        if in_flight.is_empty() {
            // Nothing ready and nothing running: either we're done, or the
            // remaining pending tasks can never become ready (a dependency
            // failed or was dropped). Either way, stop spinning — but warn
            // about any pending task left behind so a stuck run is
            // diagnosable from the logs alone.
            log_stuck_tasks(dag, &state);
            break;
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };
        let (fp, result, duration) = joined.expect("worker task must not panic across the join boundary");

        match result {
            Ok(WorkerResponse::Completed { output }) => {
                info!(fingerprint = %fp, ?duration, "task completed");
                state.status.insert(fp.clone(), TaskStatus::Completed);
                state.outcomes.insert(
                    fp,
                    TaskOutcome {
                        output: Arc::new(output),
                        duration,
                        error: None,
                    },
                );
            }
            Ok(WorkerResponse::Failed { message, .. }) => {
                warn!(fingerprint = %fp, %message, "task failed");
                state.status.insert(fp.clone(), TaskStatus::Failed);
                state.outcomes.insert(
                    fp.clone(),
                    TaskOutcome {
                        output: Arc::new(Value::Null),
                        duration,
                        error: Some(message),
                    },
                );
                cancel_descendants(dag, &state, &fp);
            }
            Err(io_err) => {
                warn!(fingerprint = %fp, error = %io_err, "worker process could not be spawned or communicated with");
                state.status.insert(fp.clone(), TaskStatus::Failed);
                state.outcomes.insert(
                    fp.clone(),
                    TaskOutcome {
                        output: Arc::new(Value::Null),
                        duration,
                        error: Some(io_err.to_string()),
                    },
                );
                cancel_descendants(dag, &state, &fp);
            }
        }
    }

    let target_status = *state.status.get(&dag.target).unwrap();
    if target_status == TaskStatus::Completed {
        Ok(Arc::clone(&state.outcomes.get(&dag.target).unwrap().output))
    } else {
        Err(build_workflow_error(dag, &state))
    }
}

/// Fingerprints not yet submitted whose dependencies have all completed.
fn ready_tasks(dag: &Dag, state: &RunState, submitted: &HashSet<String>) -> Vec<String> {
    dag.nodes
        .keys()
        .filter(|fp| !submitted.contains(*fp))
        .filter(|fp| matches!(state.status.get(*fp).map(|s| *s), Some(TaskStatus::Pending)))
        .filter(|fp| {
            dag.dependencies
                .get(*fp)
                .map(|deps| deps.iter().all(|d| matches!(state.status.get(d).map(|s| *s), Some(TaskStatus::Completed))))
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

/// BFS-cancel every not-yet-terminal descendant of `fp` (the original
/// engine does the same sweep with a plain queue over `task_dependents`).
fn cancel_descendants(dag: &Dag, state: &RunState, fp: &str) {
    let mut queue = VecDeque::new();
    queue.push_back(fp.to_string());
    let mut seen = HashSet::new();

    while let Some(current) = queue.pop_front() {
        let Some(dependents) = dag.dependents.get(&current) else {
            continue;
        };
        for dependent in dependents {
            if !seen.insert(dependent.clone()) {
                continue;
            }
            let should_cancel = matches!(
                state.status.get(dependent).map(|s| *s),
                Some(TaskStatus::Pending) | Some(TaskStatus::Running)
            );
            if should_cancel {
                state.status.insert(dependent.clone(), TaskStatus::Cancelled);
                queue.push_back(dependent.clone());
            }
        }
    }
}

/// Diagnose a stalled run: for every task still `Pending` (neither running
/// nor terminal), log which of its dependencies haven't completed. A no-op
/// when nothing is pending, which is the normal case on successful
/// completion.
fn log_stuck_tasks(dag: &Dag, state: &RunState) {
    for fp in dag.nodes.keys() {
        if !matches!(state.status.get(fp).map(|s| *s), Some(TaskStatus::Pending)) {
            continue;
        }
        let unmet: Vec<&String> = dag
            .dependencies
            .get(fp)
            .into_iter()
            .flatten()
            .filter(|d| !matches!(state.status.get(*d).map(|s| *s), Some(TaskStatus::Completed)))
            .collect();
        warn!(fingerprint = %fp, ?unmet, "task is stuck pending; unmet dependencies never completed");
    }
}

fn build_workflow_error(dag: &Dag, state: &RunState) -> WorkflowError {
    let mut summary = Vec::new();
    for (fp, handle) in &dag.nodes {
        let status = state.status.get(fp).map(|s| *s).unwrap_or(TaskStatus::Pending);
        if status == TaskStatus::Completed {
            continue;
        }
        let detail = state.outcomes.get(fp).and_then(|o| o.error.clone());
        summary.push(TaskSummary {
            fingerprint: fp.clone(),
            function: handle.function().to_string(),
            status,
            detail,
        });
    }
    WorkflowError { summary }
}

/// Replace dependency markers in a handle's arguments with the actual
/// upstream output, at the same depth `TaskHandle::dependencies` walks:
/// top-level values, and elements of a top-level array.
fn resolve_args(
    handle: &crate::handle::TaskHandle,
    state: &RunState,
) -> Result<(Vec<Value>, BTreeMap<String, Value>), DependencyMissing> {
    let task = handle.fingerprint().to_string();
    let positional = handle
        .positional()
        .iter()
        .map(|v| resolve_value(v, state, &task))
        .collect::<Result<Vec<_>, _>>()?;
    let keyword = handle
        .keyword()
        .iter()
        .map(|(k, v)| resolve_value(v, state, &task).map(|v| (k.clone(), v)))
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok((positional, keyword))
}

fn resolve_value(value: &Value, state: &RunState, task: &str) -> Result<Value, DependencyMissing> {
    if let Some(fp) = crate::handle::handle_marker_fingerprint(value) {
        return lookup_output(fp, state, task);
    }
    if let Value::Array(items) = value {
        let resolved = items
            .iter()
            .map(|item| match crate::handle::handle_marker_fingerprint(item) {
                Some(fp) => lookup_output(fp, state, task),
                None => Ok(item.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Array(resolved));
    }
    Ok(value.clone())
}

fn lookup_output(fp: &str, state: &RunState, task: &str) -> Result<Value, DependencyMissing> {
    state
        .outcomes
        .get(fp)
        .map(|o| (*o.output).clone())
        .ok_or_else(|| DependencyMissing {
            task: task.to_string(),
            dependency: fp.to_string(),
        })
}

/// Spawn a worker subprocess for one task invocation, writing the request
/// to its stdin and reading its single-line JSON response from stdout.
async fn spawn_worker(
    worker_exe: &Path,
    function: &str,
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
    work_dir: PathBuf,
    config: BTreeMap<String, Value>,
) -> std::io::Result<WorkerResponse> {
    let mut child = Command::new(worker_exe)
        .arg("__worker")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()?;

    let request = WorkerRequest {
        function: function.to_string(),
        positional,
        keyword,
        work_dir,
        config,
    };
    let mut line = serde_json::to_string(&request).map_err(std::io::Error::other)?;
    line.push('\n');

    let mut stdin = child.stdin.take().expect("stdin piped");
    stdin.write_all(line.as_bytes()).await?;
    drop(stdin);

    let mut stdout_buf = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_end(&mut stdout_buf).await?;
    }
    let mut stderr_buf = Vec::new();
    if let Some(mut stderr) = child.stderr.take() {
        stderr.read_to_end(&mut stderr_buf).await?;
    }

    let status = child.wait().await?;
    if !status.success() && stdout_buf.is_empty() {
        return Err(std::io::Error::other(format!(
            "worker process exited with {status}: {}",
            String::from_utf8_lossy(&stderr_buf)
        )));
    }

    let text = String::from_utf8_lossy(&stdout_buf);
    serde_json::from_str(text.trim_end()).map_err(std::io::Error::other)
}
