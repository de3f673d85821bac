//! `SET_VARIABLES`: evaluates a map of templates into a new output object.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::SetVariablesConfig;
use crate::template::render_value;
use crate::{ExecutableNode, NodeError, NodeInput};

#[derive(Debug, Clone, Default)]
pub struct SetVariablesNode;

#[async_trait]
impl ExecutableNode for SetVariablesNode {
    async fn execute(&self, input: &NodeInput<'_>) -> Result<Value, NodeError> {
        let config: SetVariablesConfig = input.config()?;
        if config.values.is_empty() {
            return Err(NodeError::non_retriable(format!(
                "node '{}': no values configured",
                input.node_id
            )));
        }

        let rendered = render_value(&Value::Object(config.values), input.context);
        if !rendered.unresolved.is_empty() {
            return Err(NodeError::non_retriable(format!(
                "node '{}': values reference unavailable variable(s): {}",
                input.node_id,
                rendered.unresolved.join(", ")
            )));
        }
        Ok(rendered.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{InMemoryStepStore, StepRunner};
    use crate::{Context, NodeType};
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn run(data: Value, context: &Context) -> Result<Value, NodeError> {
        let data = data.as_object().cloned().unwrap();
        let trigger = Value::Null;
        let steps = StepRunner::new(Arc::new(InMemoryStepStore::new()), Uuid::new_v4(), "vars");
        let input = NodeInput {
            run_id: steps.run_id(),
            node_id: "vars",
            node_type: NodeType::SetVariables,
            data: &data,
            context,
            trigger: &trigger,
            steps: &steps,
        };
        SetVariablesNode.execute(&input).await
    }

    #[tokio::test]
    async fn renders_every_value() {
        let ctx = Context::new().with_output("form", json!({ "name": "Ada", "plan": "pro" }));
        let out = run(
            json!({ "variableName": "vars", "values": { "greeting": "Hi {{form.name}}", "meta": { "plan": "{{form.plan}}" }, "n": 1 } }),
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(out, json!({ "greeting": "Hi Ada", "meta": { "plan": "pro" }, "n": 1 }));
    }

    #[tokio::test]
    async fn unresolved_reference_is_non_retriable() {
        let err = run(json!({ "values": { "x": "{{stripe.amount}}" } }), &Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::NonRetriable(_)));
    }

    #[tokio::test]
    async fn empty_values_is_non_retriable() {
        let err = run(json!({}), &Context::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::NonRetriable(_)));
    }
}
