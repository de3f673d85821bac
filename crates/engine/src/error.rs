//! Engine-level error types.

use nodes::NodeType;
use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// Two producers publish under the same variable name.
    #[error("variable name '{name}' is declared by both '{first}' and '{second}'")]
    DuplicateVariableName {
        name: String,
        first: String,
        second: String,
    },

    /// A node's `data` does not fit its type's configuration shape.
    #[error("node '{node_id}' has invalid configuration: {message}")]
    InvalidNodeConfig {
        node_id: String,
        message: String,
    },

    /// No executor is registered for a node's type.
    #[error("node '{node_id}' has type {node_type} with no registered executor")]
    UnregisteredNodeType {
        node_id: String,
        node_type: NodeType,
    },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    /// A lookup named a node that is not in the workflow.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    // ------ Execution errors ------

    /// A node failed with a non-retriable error; the run is terminated.
    #[error("node '{node_id}' failed and cannot be retried: {message}")]
    NodeNonRetriable {
        node_id: String,
        message: String,
    },

    /// A node's retryable error outlived the retry budget.
    #[error("node '{node_id}' still failing after {attempts} attempts: {message}")]
    NodeRetryExhausted {
        node_id: String,
        message: String,
        attempts: u32,
    },
}

impl EngineError {
    /// The node a run failed at, if this is an execution error.
    pub fn failed_node(&self) -> Option<&str> {
        match self {
            Self::NodeNonRetriable { node_id, .. } | Self::NodeRetryExhausted { node_id, .. } => {
                Some(node_id)
            }
            _ => None,
        }
    }
}
