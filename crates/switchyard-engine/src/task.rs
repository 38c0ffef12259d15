//! Task identifiers and definitions

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved name for the monorepo root itself, carrying tasks that are not
/// associated with any workspace package.
pub const ROOT_PACKAGE: &str = "//";

/// Separator between the package and task components of a task ID
const TASK_DELIMITER: char = '#';

/// Fully-qualified identifier for a task within a package
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskId {
    /// Package name
    pub package: String,
    /// Task name (e.g. "build", "test", "lint")
    pub task: String,
}

impl TaskId {
    /// Create a new task ID
    pub fn new(package: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            task: task.into(),
        }
    }

    /// Whether this task belongs to the monorepo root
    pub fn is_root_task(&self) -> bool {
        self.package == ROOT_PACKAGE
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.package, TASK_DELIMITER, self.task)
    }
}

/// Error parsing a task reference
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskRefError {
    /// Empty task name
    #[error("task name may not be empty")]
    Empty,

    /// Malformed `package#task` identifier
    #[error("malformed task identifier '{0}': expected `task` or `package#task`")]
    Malformed(String),
}

/// A reference to a task: either a bare name ("build", resolved per package)
/// or a fully-qualified `package#task` identifier.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskRef {
    /// Unqualified task name, applying to any package
    Bare(String),
    /// Package-qualified task
    Qualified(TaskId),
}

impl TaskRef {
    /// Parse a task reference, rejecting empty or malformed identifiers
    pub fn parse(s: &str) -> Result<Self, TaskRefError> {
        if s.is_empty() {
            return Err(TaskRefError::Empty);
        }
        match s.split_once(TASK_DELIMITER) {
            None => Ok(Self::Bare(s.to_string())),
            Some((package, task)) => {
                if package.is_empty() || task.is_empty() || task.contains(TASK_DELIMITER) {
                    return Err(TaskRefError::Malformed(s.to_string()));
                }
                Ok(Self::Qualified(TaskId::new(package, task)))
            }
        }
    }

    /// The task-name component of the reference
    pub fn task_name(&self) -> &str {
        match self {
            Self::Bare(name) => name,
            Self::Qualified(id) => &id.task,
        }
    }

    /// Whether this is a `package#task` reference
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified(_))
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare(name) => f.write_str(name),
            Self::Qualified(id) => id.fmt(f),
        }
    }
}

/// Definition of a task in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// The name this definition is registered under
    pub name: TaskRef,

    /// Tasks in the same package that must complete first
    #[serde(default)]
    pub deps: Vec<String>,

    /// Tasks that must complete first in every package this package
    /// depends on
    #[serde(default)]
    pub topo_deps: Vec<String>,

    /// Whether this is a long-running task; nothing may depend on it
    #[serde(default)]
    pub persistent: bool,
}

impl TaskDefinition {
    /// Define a task under a bare name, applying to any package
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: TaskRef::Bare(name.into()),
            deps: Vec::new(),
            topo_deps: Vec::new(),
            persistent: false,
        }
    }

    /// Define a task for one specific package
    pub fn qualified(package: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: TaskRef::Qualified(TaskId::new(package, task)),
            deps: Vec::new(),
            topo_deps: Vec::new(),
            persistent: false,
        }
    }

    /// Add a same-package dependency
    pub fn with_dep(mut self, dep: impl Into<String>) -> Self {
        self.deps.push(dep.into());
        self
    }

    /// Add an upstream-package dependency
    pub fn with_topo_dep(mut self, dep: impl Into<String>) -> Self {
        self.topo_deps.push(dep.into());
        self
    }

    /// Mark the task as persistent
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}
