// Dependency graph construction and validation - petgraph based
// Builds a DAG from a Pipeline document, validates it against a task
// registry, and computes the concurrency layering consumed by the
// scheduler.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::errors::ValidationError;
use crate::model::Pipeline;
use crate::registry::TaskRegistry;

/// A validated pipeline dependency graph.
///
/// Node weights are task names; edges point from a dependency to its
/// dependent, matching the direction tasks become runnable in.
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds and validates a graph from `pipeline` against `registry`.
    ///
    /// Checks run in a fixed order so the first violation encountered
    /// determines which `ValidationError` variant is returned:
    /// empty pipeline, duplicate names, unknown task keys, unknown
    /// dependencies, unknown branch keys, then cycle detection.
    pub fn build(pipeline: &Pipeline, registry: &TaskRegistry) -> Result<Self, ValidationError> {
        if pipeline.tasks.is_empty() {
            return Err(ValidationError::EmptyPipeline);
        }

        let mut seen_names = HashSet::new();
        for task in &pipeline.tasks {
            if !seen_names.insert(task.name.as_str()) {
                return Err(ValidationError::DuplicateName(task.name.clone()));
            }
        }

        for task in &pipeline.tasks {
            if !registry.contains(&task.task) {
                return Err(ValidationError::UnknownTask {
                    task: task.name.clone(),
                    key: task.task.clone(),
                });
            }
        }

        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::with_capacity(pipeline.tasks.len());
        for task in &pipeline.tasks {
            let idx = graph.add_node(task.name.clone());
            node_indices.insert(task.name.clone(), idx);
        }

        for task in &pipeline.tasks {
            for dependency in &task.depends_on {
                let Some(dep_idx) = node_indices.get(dependency) else {
                    return Err(ValidationError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                let task_idx = node_indices[&task.name];
                graph.add_edge(*dep_idx, task_idx, ());
            }
        }

        for task in &pipeline.tasks {
            if let Some(branch) = &task.branch {
                if !pipeline.branches.contains_key(branch) {
                    return Err(ValidationError::UnknownBranch {
                        task: task.name.clone(),
                        branch: branch.clone(),
                    });
                }
            }
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(ValidationError::CycleDetected);
        }

        Ok(Self {
            graph,
            node_indices,
        })
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.node_indices.keys().map(|s| s.as_str())
    }

    pub fn depends_on(&self, task: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(task) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    pub fn dependents_of(&self, task: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(task) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// Concurrency layers by repeatedly peeling the zero-indegree
    /// frontier. Every task in a layer
    /// has had all of its dependencies resolved in an earlier layer.
    pub fn layers(&self) -> Vec<Vec<String>> {
        let mut indegree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph.neighbors_directed(idx, Direction::Incoming).count(),
                )
            })
            .collect();

        let mut layers = Vec::new();
        let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();

        while !remaining.is_empty() {
            let frontier: Vec<NodeIndex> = remaining
                .iter()
                .copied()
                .filter(|idx| indegree[idx] == 0)
                .collect();

            // Unreachable once `build` has rejected cycles, kept as a
            // hard stop rather than looping forever if invariants drift.
            assert!(!frontier.is_empty(), "layering stalled on a cyclic graph");

            let mut names: Vec<String> = frontier.iter().map(|idx| self.graph[*idx].clone()).collect();
            names.sort();

            for idx in &frontier {
                remaining.remove(idx);
                for succ in self.graph.neighbors_directed(*idx, Direction::Outgoing) {
                    if let Some(count) = indegree.get_mut(&succ) {
                        *count -= 1;
                    }
                }
            }

            layers.push(names);
        }

        layers
    }

    /// Read-only access to the underlying petgraph structure, used by
    /// the DOT exporter.
    pub fn inner(&self) -> &DiGraph<String, ()> {
        &self.graph
    }
}
