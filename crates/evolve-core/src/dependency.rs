//! Ordering of repeatable migrations by their declared dependencies.

use crate::error::{CoreError, CoreResult};
use crate::migration::{normalize_identity, MigrationScript};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Graph of repeatable scripts, with an edge from each script to every
/// script it depends on.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: Vec<NodeIndex>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

impl DependencyGraph {
    /// Build the graph, resolving dependency names against each script's
    /// identity key (spaces as underscores) with or without its suffix.
    pub fn build(scripts: &[MigrationScript]) -> CoreResult<Self> {
        let mut graph = DiGraph::new();
        let mut lookup: HashMap<String, NodeIndex> = HashMap::new();
        let mut nodes = Vec::with_capacity(scripts.len());

        for script in scripts {
            let idx = graph.add_node(script.name().to_string());
            lookup.insert(script.identity_key(), idx);
            lookup.entry(script.stem_key()).or_insert(idx);
            nodes.push(idx);
        }

        for (script, &idx) in scripts.iter().zip(&nodes) {
            for dependency in script.dependencies() {
                let Some(&target) = lookup.get(&normalize_identity(dependency)) else {
                    return Err(CoreError::UnknownDependency {
                        migration: script.name().to_string(),
                        dependency: dependency.clone(),
                    });
                };
                graph.add_edge(idx, target, ());
            }
        }

        Ok(Self { graph, nodes })
    }

    /// Positions of the input scripts in execution order: dependencies
    /// first, otherwise preserving input order.
    pub fn execution_order(&self) -> CoreResult<Vec<usize>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut path = Vec::new();

        for &node in &self.nodes {
            self.visit(node, &mut marks, &mut path, &mut order)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        node: NodeIndex,
        marks: &mut [Mark],
        path: &mut Vec<NodeIndex>,
        order: &mut Vec<usize>,
    ) -> CoreResult<()> {
        match marks[node.index()] {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(self.cycle_error(node, path)),
            Mark::Unvisited => {}
        }

        marks[node.index()] = Mark::Visiting;
        path.push(node);

        // petgraph yields neighbors newest edge first
        let mut dependencies: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        dependencies.reverse();
        for dependency in dependencies {
            self.visit(dependency, marks, path, order)?;
        }

        path.pop();
        marks[node.index()] = Mark::Done;
        order.push(node.index());
        Ok(())
    }

    fn cycle_error(&self, node: NodeIndex, path: &[NodeIndex]) -> CoreError {
        let start = path.iter().position(|&n| n == node).unwrap_or(0);
        let mut names: Vec<&str> = path[start..]
            .iter()
            .map(|&n| self.graph[n].as_str())
            .collect();
        names.push(self.graph[node].as_str());
        CoreError::CircularDependency {
            cycle: names.join(" -> "),
        }
    }
}

/// Reorder repeatable scripts so every script runs after its dependencies.
pub fn sort_with_dependencies(scripts: Vec<MigrationScript>) -> CoreResult<Vec<MigrationScript>> {
    if scripts.iter().all(|s| s.dependencies().is_empty()) {
        return Ok(scripts);
    }

    let order = DependencyGraph::build(&scripts)?.execution_order()?;
    let mut slots: Vec<Option<MigrationScript>> = scripts.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

#[cfg(test)]
#[path = "dependency_test.rs"]
mod tests;
