//! Bridge from pipeline configuration to registered task definitions
//!
//! The `^` prefix is resolved here: by the time definitions reach the
//! engine, upstream deps and same-package deps are separate sets.

use switchyard_core::config::{PipelineConfig, TOPO_DEP_PREFIX};
use switchyard_core::ConfigError;

use crate::engine::Engine;
use crate::task::{TaskDefinition, TaskRef};

/// Convert a validated pipeline configuration into task definitions
pub fn task_definitions(config: &PipelineConfig) -> Result<Vec<TaskDefinition>, ConfigError> {
    config.validate()?;

    let mut definitions = Vec::with_capacity(config.pipeline.len());
    for (name, entry) in &config.pipeline {
        let reference = TaskRef::parse(name).map_err(|e| ConfigError::InvalidTaskName {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        let mut definition = TaskDefinition {
            name: reference,
            deps: Vec::new(),
            topo_deps: Vec::new(),
            persistent: entry.persistent,
        };
        for dep in &entry.depends_on {
            match dep.strip_prefix(TOPO_DEP_PREFIX) {
                Some(upstream) => definition.topo_deps.push(upstream.to_string()),
                None => definition.deps.push(dep.clone()),
            }
        }
        definitions.push(definition);
    }
    Ok(definitions)
}

impl Engine {
    /// Register every task from a pipeline configuration
    pub fn add_pipeline(&mut self, config: &PipelineConfig) -> Result<&mut Self, ConfigError> {
        for definition in task_definitions(config)? {
            self.add_task(definition);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::config::PipelineEntry;
    use switchyard_core::{PackageGraph, WorkspacePackage};

    use crate::task::{TaskId, ROOT_PACKAGE};

    fn config(entries: &[(&str, &[&str], bool)]) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        for (name, deps, persistent) in entries {
            config.pipeline.insert(
                name.to_string(),
                PipelineEntry {
                    depends_on: deps.iter().map(|s| s.to_string()).collect(),
                    persistent: *persistent,
                },
            );
        }
        config
    }

    #[test]
    fn caret_prefix_splits_upstream_deps() {
        let config = config(&[("build", &["^build", "codegen"], false)]);
        let defs = task_definitions(&config).unwrap();

        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].topo_deps, vec!["build"]);
        assert_eq!(defs[0].deps, vec!["codegen"]);
    }

    #[test]
    fn persistent_flag_carries_over() {
        let config = config(&[("dev", &[], true)]);
        let defs = task_definitions(&config).unwrap();
        assert!(defs[0].persistent);
    }

    #[test]
    fn qualified_names_parse() {
        let config = config(&[("//#lint", &[], false)]);
        let defs = task_definitions(&config).unwrap();
        assert_eq!(
            defs[0].name,
            TaskRef::Qualified(TaskId::new(ROOT_PACKAGE, "lint"))
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = config(&[("test", &["^"], false)]);
        assert!(task_definitions(&config).is_err());
    }

    #[test]
    fn add_pipeline_registers_root_tasks() {
        let topology = PackageGraph::build(&[WorkspacePackage::new("web")]).unwrap();
        let mut engine = Engine::new(topology);
        let config = config(&[("//#lint", &[], false), ("build", &["^build"], false)]);
        engine.add_pipeline(&config).unwrap();

        assert!(engine.has_task(&TaskRef::Bare("build".to_string())));
        assert!(engine.has_task(&TaskRef::Qualified(TaskId::new(ROOT_PACKAGE, "lint"))));
    }
}
