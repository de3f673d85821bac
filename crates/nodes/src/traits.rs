//! The `ExecutableNode` trait: the contract every node executor must fulfil.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{parse_config, variable_name};
use crate::step::StepRunner;
use crate::template::{self, Rendered};
use crate::{Context, NodeError, NodeType};

/// Everything an executor receives for one invocation.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency.
#[derive(Debug)]
pub struct NodeInput<'a> {
    /// ID of the current execution run.
    pub run_id: Uuid,
    pub node_id: &'a str,
    pub node_type: NodeType,
    /// Raw node configuration; string leaves may be templates.
    pub data: &'a Map<String, Value>,
    /// Outputs of every completed ancestor, keyed by variable name.
    pub context: &'a Context,
    /// Payload that fired the workflow.
    pub trigger: &'a Value,
    /// Durable step runner scoped to this node and attempt.
    pub steps: &'a StepRunner,
}

impl<'a> NodeInput<'a> {
    /// Typed view of `data`.
    pub fn config<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        parse_config(self.data)
    }

    pub fn variable_name(&self) -> Option<&'a str> {
        variable_name(self.data)
    }

    /// Resolve a template against the current context.
    pub fn render(&self, template: &str) -> Rendered {
        template::render(template, self.context)
    }

    /// Resolve a required string field.
    ///
    /// A missing or blank field, a template referencing a variable that is not
    /// in context, or a template that resolves to nothing is a
    /// [`NodeError::NonRetriable`]: re-running it unchanged cannot succeed.
    pub fn require(&self, field: &str) -> Result<String, NodeError> {
        self.optional(field)?.ok_or_else(|| {
            NodeError::non_retriable(format!("node '{}': required field '{field}' is empty", self.node_id))
        })
    }

    /// Resolve an optional string field; blank resolves to `None`.
    pub fn optional(&self, field: &str) -> Result<Option<String>, NodeError> {
        let raw = match self.data.get(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Number(n)) => return Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => return Ok(Some(b.to_string())),
            Some(_) => {
                return Err(NodeError::non_retriable(format!(
                    "node '{}': field '{field}' must be a string",
                    self.node_id
                )))
            }
        };

        let rendered = self.render(raw);
        if !rendered.is_complete() {
            return Err(NodeError::non_retriable(format!(
                "node '{}': field '{field}' references unavailable variable(s): {}",
                self.node_id,
                rendered.unresolved.join(", ")
            )));
        }

        let value = rendered.output.trim();
        Ok((!value.is_empty()).then(|| value.to_owned()))
    }
}

/// The core node trait.
///
/// An executor validates its configuration against the context, performs
/// every side effect through [`NodeInput::steps`], and returns the node's
/// output. Status publication and merging the output into the context are the
/// runtime's job.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    async fn execute(&self, input: &NodeInput<'_>) -> Result<Value, NodeError>;
}
