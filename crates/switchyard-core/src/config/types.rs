//! Pipeline configuration types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix marking a dependency on the task in upstream packages
/// (e.g. `"^build"` means "build in every package this package depends on").
pub const TOPO_DEP_PREFIX: char = '^';

/// Declarative pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum concurrent tasks
    pub concurrency: usize,

    /// Task definitions, keyed by task name or `package#task`
    #[serde(default)]
    pub pipeline: HashMap<String, PipelineEntry>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            pipeline: HashMap::new(),
        }
    }
}

/// A single task entry in the pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineEntry {
    /// Tasks that must complete first. A `^` prefix refers to the task of
    /// that name in upstream packages; no prefix refers to the same package.
    pub depends_on: Vec<String>,

    /// Whether this is a long-running task (dev server, watcher)
    pub persistent: bool,
}

impl PipelineConfig {
    /// Validate task names and dependency entries
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }

        for (name, entry) in &self.pipeline {
            validate_task_name(name)?;
            for dep in &entry.depends_on {
                validate_dependency(name, dep)?;
            }
        }
        Ok(())
    }
}

fn validate_task_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidTaskName {
            name: name.to_string(),
            reason: "task name may not be empty".to_string(),
        });
    }
    if let Some((package, task)) = name.split_once('#') {
        if package.is_empty() || task.is_empty() || task.contains('#') {
            return Err(ConfigError::InvalidTaskName {
                name: name.to_string(),
                reason: "expected `package#task` with non-empty components".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_dependency(task: &str, dep: &str) -> Result<(), ConfigError> {
    let name = dep.strip_prefix(TOPO_DEP_PREFIX).unwrap_or(dep);
    if name.is_empty() {
        return Err(ConfigError::InvalidDependency {
            task: task.to_string(),
            dep: dep.to_string(),
            reason: "dependency name may not be empty".to_string(),
        });
    }
    if name.contains('#') || name.contains(TOPO_DEP_PREFIX) {
        return Err(ConfigError::InvalidDependency {
            task: task.to_string(),
            dep: dep.to_string(),
            reason: "dependencies are task names, optionally prefixed with a single `^`"
                .to_string(),
        });
    }
    Ok(())
}
