// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::errors::{DrmflowError, Result};
use crate::types::TaskId;

/// Internal node structure: stores immediate parents and children.
#[derive(Debug, Clone, Default)]
struct GraphNode {
    /// Tasks that must finish before this one can be submitted.
    parents: Vec<TaskId>,
    /// Tasks that depend on this one.
    children: Vec<TaskId>,
}

/// In-memory task dependency graph (parent -> child edges).
///
/// Edges added through [`TaskGraph::add_edge`] are checked so the graph stays
/// acyclic. Traversals still carry a visited set, so a graph restored from a
/// corrupted store cannot make them loop forever.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, GraphNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: TaskId) {
        self.nodes.entry(id).or_default();
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: TaskId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        for parent in node.parents {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        for child in node.children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parents.retain(|p| *p != id);
            }
        }
    }

    /// Add a `parent -> child` edge.
    ///
    /// Returns `Ok(false)` if the edge already existed. Fails with
    /// [`DrmflowError::DagCycle`] if the edge would close a cycle.
    pub fn add_edge(&mut self, parent: TaskId, child: TaskId) -> Result<bool> {
        for id in [parent, child] {
            if !self.contains(id) {
                return Err(DrmflowError::TaskNotFound(id));
            }
        }
        if parent == child || self.is_reachable(child, parent) {
            return Err(DrmflowError::DagCycle(format!(
                "edge {parent} -> {child} would create a cycle"
            )));
        }
        Ok(self.insert_edge_unchecked(parent, child))
    }

    /// Insert an edge without the cycle check. Used when rebuilding a graph
    /// from persisted records.
    pub(crate) fn insert_edge_unchecked(&mut self, parent: TaskId, child: TaskId) -> bool {
        self.add_node(parent);
        self.add_node(child);

        let already = self
            .nodes
            .get(&parent)
            .is_some_and(|n| n.children.contains(&child));
        if already {
            return false;
        }

        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parents.push(parent);
        }
        true
    }

    /// Immediate parents of a task.
    pub fn parents_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(&id)
            .map(|n| n.parents.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate children of a task.
    pub fn children_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// All `(parent, child)` edges, ordered by parent.
    pub fn edges(&self) -> impl Iterator<Item = (TaskId, TaskId)> + '_ {
        self.nodes
            .iter()
            .flat_map(|(id, node)| node.children.iter().map(move |c| (*id, *c)))
    }

    /// Every task transitively reachable from `id` through child edges,
    /// excluding `id` itself.
    pub fn successors(&self, id: TaskId) -> BTreeSet<TaskId> {
        let mut found = BTreeSet::new();
        let mut visited: HashSet<TaskId> = HashSet::new();
        let mut queue: VecDeque<TaskId> = VecDeque::new();

        visited.insert(id);
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current) {
                if visited.insert(*child) {
                    found.insert(*child);
                    queue.push_back(*child);
                }
            }
        }

        found
    }

    /// Whether `to` can be reached from `from` following child edges.
    pub fn is_reachable(&self, from: TaskId, to: TaskId) -> bool {
        from == to || self.successors(from).contains(&to)
    }

    /// Tasks ordered so that every parent comes before its children.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut in_degree: BTreeMap<TaskId, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (*id, node.parents.len()))
            .collect();

        let mut ready: VecDeque<TaskId> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for child in self.children_of(id) {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push_back(*child);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = in_degree
                .iter()
                .find(|(_, deg)| **deg > 0)
                .map(|(id, _)| id.to_string())
                .unwrap_or_default();
            return Err(DrmflowError::DagCycle(format!(
                "cycle detected in task graph involving task {stuck}"
            )));
        }

        Ok(order)
    }
}
