//! Dependency graph over workspace packages
//!
//! The graph is populated by the caller (workspace discovery lives outside
//! this crate) and is read-only once built. Edges point from a package to
//! the packages it depends on.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;

/// A workspace package as reported by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspacePackage {
    /// Package name
    pub name: String,
    /// Names of workspace packages this package depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl WorkspacePackage {
    /// Create a package with no workspace dependencies
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Add a workspace dependency
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }
}

/// A node in the package graph
#[derive(Debug, Clone)]
struct PackageNode {
    /// Packages this package depends on (workspace members only)
    dependencies: Vec<String>,
    /// Packages that depend on this package
    dependents: Vec<String>,
}

/// Dependency graph for workspace packages
#[derive(Debug, Clone)]
pub struct PackageGraph {
    /// Nodes indexed by package name
    nodes: HashMap<String, PackageNode>,
    /// Topologically sorted order (dependencies before dependents)
    sorted_order: Vec<String>,
}

impl PackageGraph {
    /// Build a package graph from workspace packages.
    ///
    /// Dependencies naming packages outside the workspace are dropped.
    /// Fails if the declared dependencies form a cycle.
    pub fn build(packages: &[WorkspacePackage]) -> Result<Self, GraphError> {
        let known: HashSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();

        let mut nodes: HashMap<String, PackageNode> = HashMap::new();
        for pkg in packages {
            if pkg.name.is_empty() {
                return Err(GraphError::EmptyPackageName);
            }
            let dependencies: Vec<String> = pkg
                .dependencies
                .iter()
                .filter(|d| {
                    let in_workspace = known.contains(d.as_str());
                    if !in_workspace {
                        debug!(package = %pkg.name, dependency = %d, "dropping non-workspace dependency");
                    }
                    in_workspace
                })
                .cloned()
                .collect();
            nodes.insert(
                pkg.name.clone(),
                PackageNode {
                    dependencies,
                    dependents: Vec::new(),
                },
            );
        }

        // Reverse edges
        let edges: Vec<(String, String)> = nodes
            .iter()
            .flat_map(|(name, node)| {
                node.dependencies
                    .iter()
                    .map(|dep| (dep.clone(), name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        let sorted_order = Self::topological_sort(&nodes)?;

        Ok(Self {
            nodes,
            sorted_order,
        })
    }

    /// Topological sort using Kahn's algorithm
    fn topological_sort(nodes: &HashMap<String, PackageNode>) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut sorted: Vec<String> = Vec::new();

        for (name, node) in nodes {
            let degree = node.dependencies.len();
            in_degree.insert(name.as_str(), degree);
            if degree == 0 {
                queue.push_back(name.as_str());
            }
        }

        while let Some(name) = queue.pop_front() {
            sorted.push(name.to_string());

            if let Some(node) = nodes.get(name) {
                for dependent in &node.dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent.as_str());
                        }
                    }
                }
            }
        }

        if sorted.len() != nodes.len() {
            let in_sorted: HashSet<&str> = sorted.iter().map(String::as_str).collect();
            let mut cyclic: Vec<&str> = nodes
                .keys()
                .map(String::as_str)
                .filter(|name| !in_sorted.contains(name))
                .collect();
            cyclic.sort_unstable();
            return Err(GraphError::CyclicDependency(cyclic.join(", ")));
        }

        Ok(sorted)
    }

    /// Whether a package is part of the graph
    pub fn has_vertex(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Direct dependencies of a package (downstream edges)
    pub fn dependencies(&self, name: &str) -> HashSet<String> {
        self.nodes
            .get(name)
            .map(|n| n.dependencies.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Direct dependents of a package
    pub fn dependents(&self, name: &str) -> HashSet<String> {
        self.nodes
            .get(name)
            .map(|n| n.dependents.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Packages in topologically sorted order (dependencies first)
    pub fn sorted(&self) -> &[String] {
        &self.sorted_order
    }

    /// All package names in the graph
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of packages in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
