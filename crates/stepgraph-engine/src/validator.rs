use std::collections::HashSet;

use stepgraph_core::error::{Result, StepGraphError};
use stepgraph_core::GraphDefinition;

/// Check a definition for structural soundness.
///
/// All violations are collected in one pass and returned together as a
/// single `Validation` error; the definition is accepted only if there are
/// none.
pub fn validate(graph: &GraphDefinition) -> Result<()> {
    let errors = collect_errors(graph);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StepGraphError::Validation { errors })
    }
}

/// Every structural violation in `graph`, in a stable order.
pub fn collect_errors(graph: &GraphDefinition) -> Vec<String> {
    let mut errors = Vec::new();

    if graph.nodes.is_empty() {
        errors.push("Graph must contain at least one node".to_string());
    }

    let mut node_names: HashSet<&str> = HashSet::with_capacity(graph.nodes.len());
    let mut reported: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !node_names.insert(node.name.as_str()) && reported.insert(node.name.as_str()) {
            errors.push(format!("Duplicate node name '{}'", node.name));
        }
    }

    if !node_names.contains(graph.entry_node.as_str()) {
        errors.push(format!(
            "Entry node '{}' not found in nodes",
            graph.entry_node
        ));
    }

    for edge in &graph.edges {
        if !node_names.contains(edge.source.as_str()) {
            errors.push(format!("Edge source '{}' not found in nodes", edge.source));
        }
        if !node_names.contains(edge.target.as_str()) {
            errors.push(format!("Edge target '{}' not found in nodes", edge.target));
        }
    }

    for (node, policy) in &graph.loops {
        if !node_names.contains(node.as_str()) {
            errors.push(format!("Loop node '{}' not found in nodes", node));
        }
        if policy.max_iterations < 1 {
            errors.push(format!(
                "Loop node '{}' max_iterations must be at least 1",
                node
            ));
        }
    }

    errors
}
