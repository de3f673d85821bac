//! DAG validation: run this before persisting or executing a workflow.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference valid node IDs (both `source` and `target`).
//! 3. No two nodes may publish under the same `variableName`.
//! 4. Every node's `data` must fit its type's configuration shape.
//! 5. The directed graph must be acyclic (topological sort must succeed).
//!
//! Returns a topologically-sorted list of node IDs on success. Ties are broken
//! by document order so the same workflow always runs in the same order.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::executor::NodeRegistry;
use crate::{models::Workflow, EngineError};

/// Validate the workflow's DAG and return nodes in topological execution order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::DuplicateVariableName`] if two nodes share a `variableName`.
/// - [`EngineError::InvalidNodeConfig`] if a node's `data` has the wrong shape.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_dag(workflow: &Workflow) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(workflow.nodes.len());
    for (position, node) in workflow.nodes.iter().enumerate() {
        if index.insert(node.id.as_str(), position).is_some() {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints
    // -----------------------------------------------------------------------
    for edge in &workflow.edges {
        if !index.contains_key(edge.source.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !index.contains_key(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Variable names and per-type configuration
    // -----------------------------------------------------------------------
    let mut producers: HashMap<&str, &str> = HashMap::new();
    for node in &workflow.nodes {
        if let Some(name) = node.variable_name() {
            if let Some(first) = producers.insert(name, node.id.as_str()) {
                return Err(EngineError::DuplicateVariableName {
                    name: name.to_owned(),
                    first: first.to_owned(),
                    second: node.id.clone(),
                });
            }
        }
        node.config().map_err(|e| EngineError::InvalidNodeConfig {
            node_id: node.id.clone(),
            message: e.to_string(),
        })?;
    }

    // -----------------------------------------------------------------------
    // 4. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    // Adjacency and in-degree are indexed by document position.
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); workflow.nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; workflow.nodes.len()];
    let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();

    for edge in &workflow.edges {
        let from = index[edge.source.as_str()];
        let to = index[edge.target.as_str()];
        // Parallel edges between the same pair count once.
        if seen_edges.insert((from, to)) {
            adjacency[from].push(to);
            in_degree[to] += 1;
        }
    }

    // Ready set ordered by document position.
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(workflow.nodes.len());

    while let Some(current) = ready.pop_first() {
        sorted.push(workflow.nodes[current].id.clone());

        for &neighbour in &adjacency[current] {
            in_degree[neighbour] -= 1;
            if in_degree[neighbour] == 0 {
                ready.insert(neighbour);
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if sorted.len() != workflow.nodes.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(sorted)
}

/// Check that every node type in the workflow has an executor.
///
/// Unknown types are a save-time configuration error, never a run-time one.
pub fn validate_registry(workflow: &Workflow, registry: &NodeRegistry) -> Result<(), EngineError> {
    match workflow.nodes.iter().find(|n| !registry.contains_key(&n.node_type)) {
        Some(node) => Err(EngineError::UnregisteredNodeType {
            node_id: node.id.clone(),
            node_type: node.node_type,
        }),
        None => Ok(()),
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, Node};
    use nodes::builtin::TriggerNode;
    use nodes::NodeType;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn make_node(id: &str) -> Node {
        Node::new(id, NodeType::SetVariables, Value::Null)
    }

    fn named(id: &str, node_type: NodeType, variable: &str) -> Node {
        Node::new(id, node_type, json!({ "variableName": variable }))
    }

    fn make_workflow(nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
        Workflow::new("test", nodes, edges)
    }

    #[test]
    fn valid_linear_dag_returns_sorted_order() {
        // A → B → C
        let workflow = make_workflow(
            vec![make_node("a"), make_node("b"), make_node("c")],
            vec![Edge::new("a", "b"), Edge::new("b", "c")],
        );

        let sorted = validate_dag(&workflow).expect("should be valid");
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn valid_diamond_dag() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D
        let workflow = make_workflow(
            vec![make_node("a"), make_node("b"), make_node("c"), make_node("d")],
            vec![
                Edge::new("a", "b"),
                Edge::new("a", "c"),
                Edge::new("b", "d"),
                Edge::new("c", "d"),
            ],
        );

        let sorted = validate_dag(&workflow).expect("should be valid");
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn ties_follow_document_order_not_edge_order() {
        let workflow = make_workflow(
            vec![make_node("z"), make_node("m"), make_node("a")],
            vec![Edge::new("a", "m")],
        );
        let sorted = validate_dag(&workflow).unwrap();
        assert_eq!(sorted, vec!["z", "a", "m"]);
    }

    #[test]
    fn parallel_edges_are_harmless() {
        let workflow = make_workflow(
            vec![make_node("a"), make_node("b")],
            vec![Edge::new("a", "b"), Edge::new("a", "b")],
        );
        assert_eq!(validate_dag(&workflow).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let workflow = make_workflow(
            vec![make_node("a"), make_node("a")], // duplicate!
            vec![],
        );
        assert!(matches!(
            validate_dag(&workflow),
            Err(EngineError::DuplicateNodeId(id)) if id == "a"
        ));
    }

    #[test]
    fn edge_referencing_missing_node_is_rejected() {
        let workflow = make_workflow(
            vec![make_node("a")],
            vec![Edge::new("a", "ghost")], // ghost doesn't exist
        );
        assert!(matches!(
            validate_dag(&workflow),
            Err(EngineError::UnknownNodeReference { node_id, side: "target" }) if node_id == "ghost"
        ));
    }

    #[test]
    fn duplicate_variable_name_is_rejected() {
        let workflow = make_workflow(
            vec![
                named("a", NodeType::GoogleFormTrigger, "form"),
                named("b", NodeType::SetVariables, "form"),
            ],
            vec![Edge::new("a", "b")],
        );
        assert!(matches!(
            validate_dag(&workflow),
            Err(EngineError::DuplicateVariableName { name, first, second })
                if name == "form" && first == "a" && second == "b"
        ));
    }

    #[test]
    fn malformed_config_is_rejected() {
        let workflow = make_workflow(
            vec![Node::new("http", NodeType::HttpRequest, json!({ "method": "TELEPORT" }))],
            vec![],
        );
        assert!(matches!(
            validate_dag(&workflow),
            Err(EngineError::InvalidNodeConfig { node_id, .. }) if node_id == "http"
        ));
    }

    #[test]
    fn cycle_is_detected() {
        // A → B → C → A  (cycle!)
        let workflow = make_workflow(
            vec![make_node("a"), make_node("b"), make_node("c")],
            vec![
                Edge::new("a", "b"),
                Edge::new("b", "c"),
                Edge::new("c", "a"), // back-edge
            ],
        );
        assert!(matches!(validate_dag(&workflow), Err(EngineError::CycleDetected)));
    }

    #[test]
    fn single_node_no_edges_is_valid() {
        let workflow = make_workflow(vec![make_node("solo")], vec![]);
        let sorted = validate_dag(&workflow).expect("single node should be valid");
        assert_eq!(sorted, vec!["solo"]);
    }

    #[test]
    fn registry_must_cover_every_node_type() {
        let workflow = make_workflow(
            vec![named("t", NodeType::ManualTrigger, "trigger"), make_node("s")],
            vec![Edge::new("t", "s")],
        );
        let mut registry = NodeRegistry::new();
        registry.insert(NodeType::ManualTrigger, Arc::new(TriggerNode));

        assert!(matches!(
            validate_registry(&workflow, &registry),
            Err(EngineError::UnregisteredNodeType { node_id, node_type: NodeType::SetVariables })
                if node_id == "s"
        ));
    }
}
