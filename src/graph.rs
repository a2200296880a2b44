//! Dependency graph and scheduling (component G, §4.7).
//!
//! Backed by `petgraph`: nodes keyed by name, edges added in two passes
//! (explicit, then inferred from config/items). Cycle detection runs a
//! dedicated colored DFS rather than relying solely on `petgraph::algo`,
//! since the scheduler needs the actual offending path, not just "a cycle
//! exists somewhere".

use crate::error::{PipelineError, Result};
use crate::node::{ConfigValue, Input};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// What the graph needs to know about one registered node to build its
/// edges; independent of the concrete `Node` implementation so the graph
/// module doesn't need to know about trait objects.
pub struct NodeMeta {
    pub name: String,
    pub items: Option<Input>,
    pub config: std::collections::BTreeMap<String, ConfigValue>,
    pub explicit_dependencies: Vec<String>,
}

pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index_of: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from `nodes`, validating explicit dependency names
    /// and detecting cycles before returning.
    pub fn build(nodes: &[NodeMeta]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();

        for node in nodes {
            let index = graph.add_node(node.name.clone());
            if index_of.insert(node.name.clone(), index).is_some() {
                return Err(PipelineError::config(format!("duplicate node name: {}", node.name)));
            }
        }

        for node in nodes {
            let from = index_of[&node.name];

            for dep in &node.explicit_dependencies {
                let to = index_of.get(dep).ok_or_else(|| {
                    PipelineError::config(format!(
                        "node '{}' declares a dependency on unknown node '{dep}'",
                        node.name
                    ))
                })?;
                graph.update_edge(from, *to, ());
            }

            for ref_name in inferred_dependency_names(node) {
                if let Some(to) = index_of.get(&ref_name) {
                    graph.update_edge(from, *to, ());
                } else {
                    return Err(PipelineError::config(format!(
                        "node '{}' references unknown node '{ref_name}' in its items or config",
                        node.name
                    )));
                }
            }
        }

        if let Some(cycle) = find_cycle(&graph) {
            return Err(PipelineError::CycleDetected { cycle });
        }

        Ok(Self { graph, index_of })
    }

    /// A valid execution order: dependencies before dependents. Any graph
    /// with no cycle has one; ties are broken by `petgraph`'s internal
    /// traversal order, not guaranteed deterministic beyond that.
    pub fn topological_order(&self) -> Vec<String> {
        // Edges point from a node to its dependency (node -> dep), so a
        // topological sort of the graph as built lists dependents before
        // their dependencies. Reversing it yields dependency-first order,
        // which is what execution actually needs.
        let mut order = petgraph::algo::toposort(&self.graph, None)
            .expect("cycles are rejected in `build` before this is ever called");
        order.reverse();
        order.into_iter().map(|index| self.graph[index].clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of.contains_key(name)
    }
}

fn inferred_dependency_names(node: &NodeMeta) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(items) = &node.items {
        collect_refs_from_input(items, &mut names);
    }
    for value in node.config.values() {
        if let ConfigValue::NodeOutputRef(node_output_ref) = value {
            names.push(node_output_ref.node.clone());
        }
    }
    names
}

fn collect_refs_from_input(input: &Input, out: &mut Vec<String>) {
    match input {
        Input::Glob(_) => {}
        Input::List(items) => {
            for item in items {
                collect_refs_from_input(item, out);
            }
        }
        Input::NodeOutputRef(node_output_ref) => out.push(node_output_ref.node.clone()),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Returns the node names forming a cycle (first repeated at the end), or
/// `None` if the graph is acyclic.
fn find_cycle(graph: &DiGraph<String, ()>) -> Option<Vec<String>> {
    let mut colors: HashMap<NodeIndex, Color> =
        graph.node_indices().map(|index| (index, Color::White)).collect();
    let mut stack = Vec::new();

    for start in graph.node_indices() {
        if colors[&start] == Color::White {
            if let Some(cycle) = dfs_cycle(graph, start, &mut colors, &mut stack) {
                return Some(cycle.into_iter().map(|index| graph[index].clone()).collect());
            }
        }
    }
    None
}

fn dfs_cycle(
    graph: &DiGraph<String, ()>,
    node: NodeIndex,
    colors: &mut HashMap<NodeIndex, Color>,
    stack: &mut Vec<NodeIndex>,
) -> Option<Vec<NodeIndex>> {
    colors.insert(node, Color::Gray);
    stack.push(node);

    for neighbor in graph.neighbors(node) {
        match colors[&neighbor] {
            Color::White => {
                if let Some(cycle) = dfs_cycle(graph, neighbor, colors, stack) {
                    return Some(cycle);
                }
            }
            Color::Gray => {
                let start = stack.iter().position(|&index| index == neighbor).unwrap();
                let mut cycle: Vec<NodeIndex> = stack[start..].to_vec();
                cycle.push(neighbor);
                return Some(cycle);
            }
            Color::Black => {}
        }
    }

    stack.pop();
    colors.insert(node, Color::Black);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ConfigValue, NodeOutputRef};
    use std::collections::BTreeMap;

    fn node(name: &str, deps: &[&str]) -> NodeMeta {
        NodeMeta {
            name: name.to_string(),
            items: None,
            config: BTreeMap::new(),
            explicit_dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn topological_order_runs_dependencies_before_dependents() {
        let nodes = vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])];
        let graph = DependencyGraph::build(&nodes).unwrap();
        let order = graph.topological_order();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn unknown_explicit_dependency_is_config_error() {
        let nodes = vec![node("a", &["missing"])];
        let err = DependencyGraph::build(&nodes).unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"])];
        let err = DependencyGraph::build(&nodes).unwrap_err();
        match err {
            PipelineError::CycleDetected { cycle } => {
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn inferred_edge_from_node_output_ref_in_config() {
        let mut config = BTreeMap::new();
        config.insert(
            "stylesheet_source".to_string(),
            ConfigValue::NodeOutputRef(NodeOutputRef::new("a", "default")),
        );
        let nodes = vec![
            node("a", &[]),
            NodeMeta { name: "b".to_string(), items: None, config, explicit_dependencies: Vec::new() },
        ];
        let graph = DependencyGraph::build(&nodes).unwrap();
        let order = graph.topological_order();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
    }
}
