//! The task engine: registry of task definitions and task-graph construction

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;
use tracing::{debug, info, instrument};

use switchyard_core::PackageGraph;

use crate::graph::{TaskGraph, TaskNode};
use crate::task::{TaskDefinition, TaskId, TaskRef, ROOT_PACKAGE};

/// Errors during task-graph construction
#[derive(Debug, Error)]
pub enum EngineError {
    /// A dependency task has no definition
    #[error("Missing task definition: configure \"{task}\" or \"{id}\" in the pipeline")]
    MissingDefinition { task: String, id: TaskId },

    /// A root task surfaced without a root-package entry
    #[error(
        "\"{id}\" needs an entry for the root package before it can be depended on, \
         because it is a task run from the monorepo root"
    )]
    RootTaskUndeclared { id: TaskId },

    /// An edge would point at a persistent task
    #[error("Persistent tasks cannot be depended on: \"{dependent}\" depends on \"{dependency}\"")]
    PersistentDependedUpon {
        dependent: TaskId,
        dependency: TaskId,
    },

    /// An edge would close a cycle
    #[error("Cyclic dependency detected in task graph: \"{dependent}\" -> \"{dependency}\"")]
    CycleDetected {
        dependent: TaskId,
        dependency: TaskId,
    },

    /// An explicit dependency references a package outside the topology
    #[error("Found reference to unknown package \"{package}\" in task \"{id}\"")]
    UnknownPackage { package: String, id: TaskId },
}

/// Options for a single task-graph build
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Packages in scope; empty selects every package in the topology
    pub packages: Vec<String>,
    /// Requested task names; empty selects all registered bare names
    pub task_names: Vec<String>,
    /// Restrict dependency expansion to the requested task names
    pub tasks_only: bool,
}

/// The task engine: a package topology plus registered task definitions,
/// expanded on demand into a concrete [`TaskGraph`].
#[derive(Debug)]
pub struct Engine {
    topology: PackageGraph,
    tasks: HashMap<TaskRef, TaskDefinition>,
    /// Explicit `(dependency, dependent)` edges between fully-qualified tasks
    package_task_deps: Vec<(TaskId, TaskId)>,
    /// Bare task names registered against the root package
    root_enabled_tasks: HashSet<String>,
}

impl Engine {
    /// Create an engine over a package topology
    pub fn new(topology: PackageGraph) -> Self {
        Self {
            topology,
            tasks: HashMap::new(),
            package_task_deps: Vec::new(),
            root_enabled_tasks: HashSet::new(),
        }
    }

    /// The package topology this engine was built over
    pub fn topology(&self) -> &PackageGraph {
        &self.topology
    }

    /// Register a task definition. A definition qualified for the root
    /// package also marks its task name as runnable from the root.
    pub fn add_task(&mut self, def: TaskDefinition) -> &mut Self {
        if let TaskRef::Qualified(id) = &def.name {
            if id.package == ROOT_PACKAGE {
                self.root_enabled_tasks.insert(id.task.clone());
            }
        }
        self.tasks.insert(def.name.clone(), def);
        self
    }

    /// Add an explicit edge: `to` depends on `from`, both fully qualified.
    pub fn add_dep(&mut self, from: TaskId, to: TaskId) -> Result<&mut Self, EngineError> {
        if from.package != ROOT_PACKAGE && !self.topology.has_vertex(&from.package) {
            return Err(EngineError::UnknownPackage {
                package: from.package.clone(),
                id: from,
            });
        }
        self.package_task_deps.push((from, to));
        Ok(self)
    }

    /// Whether a reference names a registered definition (exact key match)
    pub fn has_task(&self, reference: &TaskRef) -> bool {
        self.tasks.contains_key(reference)
    }

    /// Resolve the definition for a task in a package: an exact
    /// `package#task` registration wins over a bare one.
    fn lookup(&self, package: &str, task: &str) -> Option<&TaskDefinition> {
        self.tasks
            .get(&TaskRef::Qualified(TaskId::new(package, task)))
            .or_else(|| self.tasks.get(&TaskRef::Bare(task.to_string())))
    }

    fn missing(&self, id: &TaskId) -> EngineError {
        EngineError::MissingDefinition {
            task: id.task.clone(),
            id: id.clone(),
        }
    }

    /// Build the task graph for the selected packages and tasks.
    ///
    /// Expansion walks a work queue of task IDs breadth-first: each task
    /// contributes edges to the same task in upstream packages (topo deps),
    /// to its same-package deps, and to any explicit deps; a task with no
    /// dependencies at all is connected to the sentinel root node.
    #[instrument(skip_all, fields(
        packages = options.packages.len(),
        tasks = options.task_names.len(),
        tasks_only = options.tasks_only,
    ))]
    pub fn prepare(&self, options: &PrepareOptions) -> Result<TaskGraph, EngineError> {
        let packages: Vec<String> = if options.packages.is_empty() {
            self.topology.package_names().map(str::to_string).collect()
        } else {
            options.packages.clone()
        };

        let task_names: Vec<String> = if options.task_names.is_empty() {
            self.tasks
                .keys()
                .filter_map(|r| match r {
                    TaskRef::Bare(name) => Some(name.clone()),
                    TaskRef::Qualified(_) => None,
                })
                .collect()
        } else {
            options.task_names.clone()
        };

        let mut explicit_deps: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for (from, to) in &self.package_task_deps {
            explicit_deps
                .entry(to.clone())
                .or_default()
                .push(from.clone());
        }

        let mut graph = TaskGraph::new();
        let mut queue: VecDeque<TaskId> = VecDeque::new();

        for package in &packages {
            let is_root = package == ROOT_PACKAGE;
            for task in &task_names {
                if is_root && !self.root_enabled_tasks.contains(task) {
                    continue;
                }
                // Top-level tasks are not required to exist in every package;
                // dependency tasks are.
                if self.lookup(package, task).is_none() {
                    debug!(package, task, "skipping undefined top-level task");
                    continue;
                }
                queue.push_back(TaskId::new(package.clone(), task.clone()));
            }
        }

        let mut visited: HashSet<TaskId> = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if id.is_root_task() && !self.root_enabled_tasks.contains(&id.task) {
                return Err(EngineError::RootTaskUndeclared { id });
            }

            let def = self
                .lookup(&id.package, &id.task)
                .ok_or_else(|| self.missing(&id))?;

            if !visited.insert(id.clone()) {
                continue;
            }

            // Derived sets: under tasks_only, only requested task names are
            // followed. The registered definition is never mutated.
            let in_scope =
                |d: &&String| !options.tasks_only || task_names.iter().any(|t| t == *d);
            let deps: Vec<&String> = def.deps.iter().filter(in_scope).collect();
            let topo_deps: Vec<&String> = def.topo_deps.iter().filter(in_scope).collect();

            let downstream = self.topology.dependencies(&id.package);
            let has_topo_deps = !topo_deps.is_empty() && !downstream.is_empty();
            let has_deps = !deps.is_empty();
            let has_explicit_deps = explicit_deps.contains_key(&id);

            if has_topo_deps {
                for dep in &topo_deps {
                    for upstream in &downstream {
                        let from = TaskId::new(upstream.clone(), (*dep).clone());
                        self.connect(&mut graph, &id, &from)?;
                        queue.push_back(from);
                    }
                }
            }

            if has_deps {
                for dep in &deps {
                    let from = TaskId::new(id.package.clone(), (*dep).clone());
                    self.connect(&mut graph, &id, &from)?;
                    queue.push_back(from);
                }
            }

            if has_explicit_deps {
                if let Some(froms) = explicit_deps.get(&id) {
                    for from in froms {
                        self.connect(&mut graph, &id, from)?;
                        queue.push_back(from.clone());
                    }
                }
            }

            if !has_topo_deps && !has_deps && !has_explicit_deps {
                let task = graph.ensure(TaskNode::Task(id.clone()));
                let root = graph.ensure(TaskNode::Root);
                graph
                    .connect(task, root)
                    .map_err(|_| EngineError::CycleDetected {
                        dependent: id.clone(),
                        dependency: id,
                    })?;
            }
        }

        info!(
            tasks = graph.task_count(),
            edges = graph.edge_count(),
            "task graph built"
        );
        Ok(graph)
    }

    /// Add `dependent -> dependency` to the graph. The dependency must have
    /// a definition and may not be persistent.
    fn connect(
        &self,
        graph: &mut TaskGraph,
        dependent: &TaskId,
        dependency: &TaskId,
    ) -> Result<(), EngineError> {
        let def = self
            .lookup(&dependency.package, &dependency.task)
            .ok_or_else(|| self.missing(dependency))?;

        if def.persistent {
            return Err(EngineError::PersistentDependedUpon {
                dependent: dependent.clone(),
                dependency: dependency.clone(),
            });
        }

        let from = graph.ensure(TaskNode::Task(dependency.clone()));
        let to = graph.ensure(TaskNode::Task(dependent.clone()));
        graph
            .connect(to, from)
            .map_err(|_| EngineError::CycleDetected {
                dependent: dependent.clone(),
                dependency: dependency.clone(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use switchyard_core::WorkspacePackage;

    fn id(package: &str, task: &str) -> TaskId {
        TaskId::new(package, task)
    }

    fn single_package() -> PackageGraph {
        PackageGraph::build(&[WorkspacePackage::new("web")]).unwrap()
    }

    fn app_libs() -> PackageGraph {
        PackageGraph::build(&[
            WorkspacePackage::new("lib-a"),
            WorkspacePackage::new("lib-b"),
            WorkspacePackage::new("app")
                .with_dependency("lib-a")
                .with_dependency("lib-b"),
        ])
        .unwrap()
    }

    fn prepare_for(engine: &Engine, packages: &[&str], tasks: &[&str]) -> Result<TaskGraph, EngineError> {
        engine.prepare(&PrepareOptions {
            packages: packages.iter().map(|s| s.to_string()).collect(),
            task_names: tasks.iter().map(|s| s.to_string()).collect(),
            tasks_only: false,
        })
    }

    #[test]
    fn single_leaf_connects_to_sentinel() {
        let mut engine = Engine::new(single_package());
        engine.add_task(TaskDefinition::bare("build"));

        let graph = prepare_for(&engine, &["web"], &["build"]).unwrap();
        assert_eq!(graph.task_count(), 1);
        assert!(graph.depends_on_root(&id("web", "build")));
    }

    #[test]
    fn topo_deps_fan_out_to_upstream_packages() {
        let mut engine = Engine::new(app_libs());
        engine.add_task(TaskDefinition::bare("build").with_topo_dep("build"));

        let graph = prepare_for(&engine, &["app"], &["build"]).unwrap();

        let deps: BTreeSet<String> = graph
            .dependencies_of(&id("app", "build"))
            .into_iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(
            deps,
            BTreeSet::from(["lib-a#build".to_string(), "lib-b#build".to_string()])
        );
        assert!(graph.depends_on_root(&id("lib-a", "build")));
        assert!(graph.depends_on_root(&id("lib-b", "build")));
    }

    #[test]
    fn same_package_deps_chain() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("build"))
            .add_task(TaskDefinition::bare("test").with_dep("build"));

        let graph = prepare_for(&engine, &["web"], &["test"]).unwrap();

        assert_eq!(graph.dependencies_of(&id("web", "test")), vec![id("web", "build")]);
        assert!(graph.depends_on_root(&id("web", "build")));
        assert!(!graph.depends_on_root(&id("web", "test")));
    }

    #[test]
    fn persistent_tasks_cannot_be_depended_on() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("dev").persistent(true))
            .add_task(TaskDefinition::bare("build").with_dep("dev"));

        let err = prepare_for(&engine, &["web"], &["build"]).unwrap_err();
        match err {
            EngineError::PersistentDependedUpon {
                dependent,
                dependency,
            } => {
                assert_eq!(dependent, id("web", "build"));
                assert_eq!(dependency, id("web", "dev"));
            }
            other => panic!("expected PersistentDependedUpon, got {other:?}"),
        }
    }

    #[test]
    fn root_tasks_require_registration() {
        let mut engine = Engine::new(single_package());
        engine.add_task(TaskDefinition::qualified(ROOT_PACKAGE, "lint"));

        let graph = prepare_for(&engine, &[ROOT_PACKAGE], &["lint"]).unwrap();
        assert!(graph.contains_task(&id(ROOT_PACKAGE, "lint")));
        assert!(graph.depends_on_root(&id(ROOT_PACKAGE, "lint")));
    }

    #[test]
    fn undeclared_root_task_is_skipped_at_top_level() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::qualified(ROOT_PACKAGE, "lint"))
            .add_task(TaskDefinition::bare("build"));

        let graph = prepare_for(&engine, &[ROOT_PACKAGE], &["build"]).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn undeclared_root_task_as_dependency_fails() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("build"))
            .add_task(TaskDefinition::qualified(ROOT_PACKAGE, "check").with_dep("build"));

        let err = prepare_for(&engine, &[ROOT_PACKAGE], &["check"]).unwrap_err();
        match err {
            EngineError::RootTaskUndeclared { id: task_id } => {
                assert_eq!(task_id, id(ROOT_PACKAGE, "build"));
            }
            other => panic!("expected RootTaskUndeclared, got {other:?}"),
        }
    }

    #[test]
    fn missing_dependency_definition_fails() {
        let mut engine = Engine::new(single_package());
        engine.add_task(TaskDefinition::bare("test").with_dep("build"));

        let err = prepare_for(&engine, &["web"], &["test"]).unwrap_err();
        match err {
            EngineError::MissingDefinition { task, id: task_id } => {
                assert_eq!(task, "build");
                assert_eq!(task_id, id("web", "build"));
            }
            other => panic!("expected MissingDefinition, got {other:?}"),
        }
    }

    #[test]
    fn missing_top_level_task_is_skipped() {
        let mut engine = Engine::new(app_libs());
        engine.add_task(TaskDefinition::qualified("app", "deploy"));

        // deploy exists only in app; lib-a and lib-b contribute nothing
        let graph = prepare_for(&engine, &["app", "lib-a", "lib-b"], &["deploy"]).unwrap();
        assert_eq!(graph.task_count(), 1);
        assert!(graph.contains_task(&id("app", "deploy")));
    }

    #[test]
    fn qualified_registration_overrides_bare() {
        let mut engine = Engine::new(app_libs());
        engine
            .add_task(TaskDefinition::bare("build").with_topo_dep("build"))
            .add_task(TaskDefinition::qualified("lib-a", "build").persistent(true));

        // lib-a's build is persistent under its package-specific definition,
        // so app#build may not depend on it.
        let err = prepare_for(&engine, &["app"], &["build"]).unwrap_err();
        assert!(matches!(err, EngineError::PersistentDependedUpon { .. }));
    }

    #[test]
    fn explicit_deps_are_wired() {
        let mut engine = Engine::new(app_libs());
        engine
            .add_task(TaskDefinition::bare("build"))
            .add_task(TaskDefinition::bare("codegen"));
        engine
            .add_dep(id("lib-a", "codegen"), id("app", "build"))
            .unwrap();

        let graph = prepare_for(&engine, &["app"], &["build"]).unwrap();
        assert_eq!(
            graph.dependencies_of(&id("app", "build")),
            vec![id("lib-a", "codegen")]
        );
        assert!(graph.depends_on_root(&id("lib-a", "codegen")));
    }

    #[test]
    fn add_dep_rejects_unknown_package() {
        let mut engine = Engine::new(single_package());
        let err = engine
            .add_dep(id("phantom", "build"), id("web", "build"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownPackage { package, .. } if package == "phantom"));
    }

    #[test]
    fn add_dep_allows_root_package() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("build"))
            .add_task(TaskDefinition::qualified(ROOT_PACKAGE, "setup"));
        engine
            .add_dep(id(ROOT_PACKAGE, "setup"), id("web", "build"))
            .unwrap();

        let graph = prepare_for(&engine, &["web"], &["build"]).unwrap();
        assert_eq!(
            graph.dependencies_of(&id("web", "build")),
            vec![id(ROOT_PACKAGE, "setup")]
        );
    }

    #[test]
    fn cycles_are_detected() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("a").with_dep("b"))
            .add_task(TaskDefinition::bare("b").with_dep("a"));

        let err = prepare_for(&engine, &["web"], &["a"]).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut engine = Engine::new(single_package());
        engine.add_task(TaskDefinition::bare("build").with_dep("build"));

        let err = prepare_for(&engine, &["web"], &["build"]).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
    }

    #[test]
    fn tasks_only_filters_by_membership() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("codegen"))
            .add_task(TaskDefinition::bare("build").with_dep("codegen"))
            .add_task(
                TaskDefinition::bare("test")
                    .with_dep("build")
                    .with_dep("codegen"),
            );

        let graph = engine
            .prepare(&PrepareOptions {
                packages: vec!["web".to_string()],
                task_names: vec!["test".to_string(), "codegen".to_string()],
                tasks_only: true,
            })
            .unwrap();

        // "build" is filtered out, "codegen" is kept: membership, not
        // first-element comparison.
        assert_eq!(
            graph.dependencies_of(&id("web", "test")),
            vec![id("web", "codegen")]
        );
        assert!(!graph.contains_task(&id("web", "build")));
    }

    #[test]
    fn tasks_only_does_not_mutate_registry() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("build"))
            .add_task(TaskDefinition::bare("test").with_dep("build"));

        let filtered = engine
            .prepare(&PrepareOptions {
                packages: vec!["web".to_string()],
                task_names: vec!["test".to_string()],
                tasks_only: true,
            })
            .unwrap();
        assert!(filtered.dependencies_of(&id("web", "test")).is_empty());

        // A later unfiltered build still sees the dependency.
        let full = prepare_for(&engine, &["web"], &["test"]).unwrap();
        assert_eq!(full.dependencies_of(&id("web", "test")), vec![id("web", "build")]);
    }

    #[test]
    fn empty_task_names_default_to_bare_registrations() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("build"))
            .add_task(TaskDefinition::bare("lint"))
            .add_task(TaskDefinition::qualified(ROOT_PACKAGE, "release"));

        let graph = prepare_for(&engine, &["web"], &[]).unwrap();
        assert!(graph.contains_task(&id("web", "build")));
        assert!(graph.contains_task(&id("web", "lint")));
        assert!(!graph.contains_task(&id("web", "release")));
    }

    #[test]
    fn empty_packages_default_to_topology() {
        let mut engine = Engine::new(app_libs());
        engine.add_task(TaskDefinition::bare("build"));

        let graph = prepare_for(&engine, &[], &["build"]).unwrap();
        assert_eq!(graph.task_count(), 3);
        assert!(graph.contains_task(&id("app", "build")));
        assert!(graph.contains_task(&id("lib-a", "build")));
        assert!(graph.contains_task(&id("lib-b", "build")));
    }

    #[test]
    fn construction_is_deterministic() {
        let mut engine = Engine::new(app_libs());
        engine
            .add_task(TaskDefinition::bare("build").with_topo_dep("build"))
            .add_task(TaskDefinition::bare("test").with_dep("build"));

        let options = PrepareOptions {
            packages: Vec::new(),
            task_names: vec!["test".to_string()],
            tasks_only: false,
        };
        let a = engine.prepare(&options).unwrap();
        let b = engine.prepare(&options).unwrap();

        let ids = |g: &TaskGraph| g.task_ids().map(|t| t.to_string()).collect::<BTreeSet<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.edge_count(), b.edge_count());
        for task in a.task_ids() {
            let deps = |g: &TaskGraph| {
                g.dependencies_of(task)
                    .into_iter()
                    .map(|d| d.to_string())
                    .collect::<BTreeSet<_>>()
            };
            assert_eq!(deps(&a), deps(&b), "dependencies of {task} differ");
        }
    }

    #[test]
    fn duplicate_declared_deps_collapse() {
        let mut engine = Engine::new(single_package());
        engine
            .add_task(TaskDefinition::bare("build"))
            .add_task(
                TaskDefinition::bare("test")
                    .with_dep("build")
                    .with_dep("build"),
            );

        let graph = prepare_for(&engine, &["web"], &["test"]).unwrap();
        assert_eq!(graph.dependencies_of(&id("web", "test")), vec![id("web", "build")]);
    }
}
