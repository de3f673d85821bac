//! Trigger executor: publishes the payload that fired the workflow.

use async_trait::async_trait;
use serde_json::Value;

use crate::{ExecutableNode, NodeError, NodeInput};

/// Shared by every trigger kind; the payload shape is the trigger source's.
#[derive(Debug, Clone, Default)]
pub struct TriggerNode;

#[async_trait]
impl ExecutableNode for TriggerNode {
    async fn execute(&self, input: &NodeInput<'_>) -> Result<Value, NodeError> {
        if !input.node_type.is_trigger() {
            return Err(NodeError::non_retriable(format!(
                "node '{}' of type {} is not a trigger",
                input.node_id, input.node_type
            )));
        }
        Ok(input.trigger.clone())
    }
}
