//! Switchyard Engine - Task-graph construction and execution
//!
//! This crate expands a declarative pipeline over a workspace topology into
//! a concrete DAG of package-tasks and walks it concurrently, honoring
//! task-level and cross-package dependency constraints.

pub mod args;
pub mod engine;
pub mod executor;
pub mod graph;
pub mod pipeline;
pub mod reporter;
pub mod task;

pub use args::{resolve_targets, ArgsError, ResolvedArgs};
pub use engine::{Engine, EngineError, PrepareOptions};
pub use executor::{ExecOptions, ExecutionError, Executor, VisitorError};
pub use graph::{TaskGraph, TaskNode};
pub use pipeline::task_definitions;
pub use reporter::{CollectingReporter, TracingReporter, WalkEvent, WalkReporter};
pub use task::{TaskDefinition, TaskId, TaskRef, TaskRefError, ROOT_PACKAGE};
