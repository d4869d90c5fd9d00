//! # taskflow
//!
//! A parallel, DAG-based task workflow engine. Tasks are plain Rust
//! functions registered under a name; calling a registered task through a
//! [`Workflow`](workflow::Workflow) never executes it — it only builds a
//! [`TaskHandle`](handle::TaskHandle), a content-addressed placeholder for
//! the eventual result. Requesting the result of one handle via
//! [`Workflow::run`](workflow::Workflow::run) walks backward from it to
//! build the minimal dependency graph, then runs that graph with as much
//! parallelism as the configured worker count allows.
//!
//! Each task invocation runs in its own OS process, not a thread: Rust has
//! no equivalent of pickling a closure across a fork, so the engine instead
//! re-executes its own binary with a hidden subcommand and resolves the
//! task function to call by name, through a process-wide registry built at
//! startup (see [`task`]).
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`handle`] | Task identity: fingerprinting, dependency discovery |
//! | [`task`] | Task function signature, [`register_task!`] registry |
//! | [`registry`] | Per-workflow name registration, handle construction |
//! | [`dag`] | Backward graph construction from one requested handle |
//! | [`scheduler`] | The parallel run loop: readiness, submission, cancellation |
//! | [`worker`] | Child-process side of one task invocation |
//! | [`shell`] | Shelling out to an external command from a task |
//! | [`link`] | Symlinking an upstream task's output files into a work dir |
//! | [`config`] | The workflow-level configuration map |
//! | [`workflow`] | The user-facing [`Workflow`](workflow::Workflow) type |
//! | [`error`] | Error taxonomy and [`error::FixSuggestion`] |

pub mod config;
pub mod dag;
pub mod error;
pub mod handle;
pub mod link;
pub mod registry;
pub mod scheduler;
pub mod shell;
pub mod task;
pub mod worker;
pub mod workflow;

pub use error::EngineError;
pub use handle::{TaskHandle, TaskStatus};
pub use task::{TaskArgs, TaskContext, TaskFn};
pub use workflow::Workflow;
