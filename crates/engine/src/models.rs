//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory and on the wire: the canvas saves `{ nodes, edges }` and the runtime
//! reads the same document at run start without ever mutating it.

use nodes::config::{self, NodeConfig};
use nodes::NodeType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single trigger or action on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Free-form configuration; string leaves may be templates.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Node {
    /// Convenience constructor; a non-object `data` becomes an empty map.
    pub fn new(id: impl Into<String>, node_type: NodeType, data: Value) -> Self {
        Self {
            id: id.into(),
            node_type,
            data: match data {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// The slot under which this node's output is visible downstream.
    pub fn variable_name(&self) -> Option<&str> {
        config::variable_name(&self.data)
    }

    /// Typed configuration for this node's kind.
    pub fn config(&self) -> Result<NodeConfig, serde_json::Error> {
        NodeConfig::parse(self.node_type, &self.data)
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed dependency from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let (source, target) = (source.into(), target.into());
        Self { id: format!("{source}->{target}"), source, target }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete, persisted workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { id: Uuid::new_v4(), name: name.into(), nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
