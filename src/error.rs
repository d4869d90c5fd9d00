//! # Error taxonomy
//!
//! One enum per failure domain, plus a `FixSuggestion` trait so the CLI can
//! print a one-line actionable hint next to every error, the same shape the
//! engine's error handling has always used.

use std::path::PathBuf;
use thiserror::Error;

/// Trait for errors that can provide fix suggestions.
pub trait FixSuggestion {
    /// A short actionable hint for resolving this error, if one exists.
    fn fix_suggestion(&self) -> Option<&str>;
}

/// A shell command exited non-zero.
#[derive(Error, Debug, Clone)]
#[error("command exited with status {code}: {command}")]
pub struct ShellError {
    pub command: String,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl FixSuggestion for ShellError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some("inspect stderr in the error, or re-run the generated .command.sh manually")
    }
}

/// A user task function failed inside a worker process.
#[derive(Error, Debug, Clone)]
#[error("task failed: {message}")]
pub struct TaskError {
    pub message: String,
    pub traceback: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: traceback.into(),
        }
    }
}

impl FixSuggestion for TaskError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some("see the traceback field for the originating panic or error")
    }
}

/// Internal: a dependency result was missing when resolving a ready task's
/// arguments. Always converted into a task failure before it escapes `run`.
#[derive(Error, Debug, Clone)]
#[error("dependency '{dependency}' missing result while resolving task '{task}'")]
pub struct DependencyMissing {
    pub task: String,
    pub dependency: String,
}

/// Summary of one non-completed task, used in `WorkflowError::Failed`.
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub fingerprint: String,
    pub function: String,
    pub status: crate::handle::TaskStatus,
    pub detail: Option<String>,
}

/// The terminal task did not reach `Completed`.
#[derive(Error, Debug, Clone)]
pub struct WorkflowError {
    pub summary: Vec<TaskSummary>,
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "workflow failed: {} task(s) did not complete", self.summary.len())?;
        for t in &self.summary {
            write!(f, "  - {} ({}): {:?}", t.function, t.fingerprint, t.status)?;
            if let Some(detail) = &t.detail {
                write!(f, " — {detail}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl FixSuggestion for WorkflowError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some("re-run with RUST_LOG=debug to see which dependency first failed")
    }
}

/// Surfaced by user tasks when required configuration keys are missing.
/// The engine never originates this itself — it only ever appears wrapped
/// inside a `TaskError` coming back from a worker.
#[derive(Error, Debug, Clone)]
#[error("missing configuration key: {0}")]
pub struct ConfigError(pub String);

impl FixSuggestion for ConfigError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some("add the missing key to the config file passed to --config")
    }
}

/// Top-level error for the CLI entry point, wrapping the specific domains.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Shell(#[from] ShellError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl FixSuggestion for EngineError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            EngineError::Shell(e) => e.fix_suggestion(),
            EngineError::Task(e) => e.fix_suggestion(),
            EngineError::Workflow(e) => e.fix_suggestion(),
            EngineError::Config(e) => e.fix_suggestion(),
            EngineError::Io { .. } => Some("check the path exists and has correct permissions"),
            EngineError::Other(_) => None,
        }
    }
}
