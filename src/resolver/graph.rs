//! Dependency graph over the extension keys selected into a plan.
//!
//! The graph carries only depends edges between plan members. It yields the
//! installation order (dependencies before dependents) and detects cycles so
//! the resolver can fall back to its discovery order when the graph cannot be
//! sorted.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet
    White,
    /// In the current DFS stack
    Gray,
    /// Fully visited
    Black,
}

/// Directed graph of extension keys with depends edges.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, key: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(key) {
            index
        } else {
            let index = self.graph.add_node(key.to_string());
            self.node_map.insert(key.to_string(), index);
            index
        }
    }

    /// Add an extension key as a node, without edges.
    pub fn add_extension(&mut self, key: &str) {
        self.ensure_node(key);
    }

    /// Record that `from` depends on `to`, so `to` installs first.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);

        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Detect cycles with a colored DFS; the error names the cycle path.
    pub fn detect_cycles(&self) -> Result<()> {
        let mut colors: HashMap<NodeIndex, Color> = HashMap::new();
        let mut path: Vec<String> = Vec::new();

        for node in self.graph.node_indices() {
            colors.insert(node, Color::White);
        }

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White))
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Err(anyhow!(
                    "Circular dependency detected: {}",
                    cycle.join(" -> ")
                ));
            }
        }

        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        colors.insert(node, Color::Gray);
        path.push(self.graph[node].clone());

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    // Close the loop in the reported path.
                    let cycle_start = path.iter().position(|n| *n == self.graph[neighbor])?;
                    let mut cycle = path[cycle_start..].to_vec();
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Installation order: every dependency before its dependents.
    ///
    /// Fails when the graph is cyclic; the caller decides the fallback.
    pub fn install_order(&self) -> Result<Vec<String>> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => {
                // Toposort puts dependents first; reverse for install order.
                Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect())
            }
            Err(_) => Err(anyhow!("Failed to determine installation order")),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
