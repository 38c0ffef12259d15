//! The concrete package-task DAG produced by a build
//!
//! Edges point from a task to the tasks it depends on. Acyclicity is
//! enforced by daggy at edge-insertion time.

use std::collections::HashMap;

use daggy::{Dag, NodeIndex, Walker, WouldCycle};

use crate::task::TaskId;

/// A node in the task graph
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum TaskNode {
    /// Synthetic sink node. Every task with no other outgoing edge points
    /// here, so the walker can treat all tasks uniformly.
    Root,
    /// A concrete package-task
    Task(TaskId),
}

impl TaskNode {
    /// The task ID, if this is not the sentinel
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Root => None,
            Self::Task(id) => Some(id),
        }
    }
}

/// Directed acyclic graph of package-tasks
#[derive(Debug, Clone)]
pub struct TaskGraph {
    dag: Dag<TaskNode, ()>,
    indices: HashMap<TaskNode, NodeIndex>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGraph {
    /// Create an empty task graph
    pub fn new() -> Self {
        Self {
            dag: Dag::new(),
            indices: HashMap::new(),
        }
    }

    /// Insert a node if not already present, returning its index
    pub(crate) fn ensure(&mut self, node: TaskNode) -> NodeIndex {
        if let Some(&index) = self.indices.get(&node) {
            return index;
        }
        let index = self.dag.add_node(node.clone());
        self.indices.insert(node, index);
        index
    }

    /// Connect `dependent -> dependency`. Inserting an edge that would close
    /// a cycle fails; an already-present edge is left as is.
    pub(crate) fn connect(
        &mut self,
        dependent: NodeIndex,
        dependency: NodeIndex,
    ) -> Result<(), WouldCycle<()>> {
        if self.dag.find_edge(dependent, dependency).is_some() {
            return Ok(());
        }
        self.dag.add_edge(dependent, dependency, ())?;
        Ok(())
    }

    pub(crate) fn index_of(&self, node: &TaskNode) -> Option<NodeIndex> {
        self.indices.get(node).copied()
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &TaskNode {
        &self.dag[index]
    }

    pub(crate) fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.dag.node_count()).map(NodeIndex::new)
    }

    /// Nodes this node depends on (targets of its outgoing edges)
    pub(crate) fn dependencies_by_index(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.dag.children(index).iter(&self.dag).map(|(_, n)| n).collect()
    }

    /// Nodes that depend on this node (sources of its incoming edges)
    pub(crate) fn dependents_by_index(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.dag.parents(index).iter(&self.dag).map(|(_, n)| n).collect()
    }

    /// Number of nodes, including the sentinel when present
    pub fn node_count(&self) -> usize {
        self.dag.node_count()
    }

    /// Number of concrete package-tasks
    pub fn task_count(&self) -> usize {
        self.indices
            .keys()
            .filter(|n| !matches!(n, TaskNode::Root))
            .count()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    /// Check if the graph has no tasks
    pub fn is_empty(&self) -> bool {
        self.task_count() == 0
    }

    /// Whether a package-task is part of the graph
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.indices.contains_key(&TaskNode::Task(id.clone()))
    }

    /// All package-task IDs in the graph
    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.indices.keys().filter_map(TaskNode::task_id)
    }

    /// The tasks a task depends on, excluding the sentinel
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<TaskId> {
        let Some(index) = self.index_of(&TaskNode::Task(id.clone())) else {
            return Vec::new();
        };
        self.dependencies_by_index(index)
            .into_iter()
            .filter_map(|n| self.node(n).task_id().cloned())
            .collect()
    }

    /// Whether a task's only outgoing edge is to the sentinel
    pub fn depends_on_root(&self, id: &TaskId) -> bool {
        let Some(index) = self.index_of(&TaskNode::Task(id.clone())) else {
            return false;
        };
        let deps = self.dependencies_by_index(index);
        deps.len() == 1 && matches!(self.node(deps[0]), TaskNode::Root)
    }
}
