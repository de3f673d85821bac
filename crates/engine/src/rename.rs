//! Variable rename propagation.
//!
//! When a producer's `variableName` changes, every template downstream of it
//! that referenced the old name is rewritten. Nodes outside the downstream set
//! (the producer itself included) are left exactly as they were.

use std::borrow::Cow;

use nodes::config::VARIABLE_NAME_KEY;
use nodes::template;
use serde_json::{Map, Value};
use tracing::debug;

use crate::graph::Graph;
use crate::models::{Edge, Node, Workflow};
use crate::EngineError;

/// Rewrite references to `old` in every node downstream of `source`.
///
/// The result lines up with `nodes`. A node whose data changed comes back as
/// `Cow::Owned`; every other node, the source included, is `Cow::Borrowed`
/// and points at the input element, so callers can persist only the owned
/// entries. When `old == new` every entry is borrowed.
pub fn propagate_rename<'a>(
    source: &str,
    old: &str,
    new: &str,
    nodes: &'a [Node],
    edges: &[Edge],
) -> Vec<Cow<'a, Node>> {
    if old == new {
        return nodes.iter().map(Cow::Borrowed).collect();
    }

    let downstream = Graph::new(nodes, edges).downstream_of(source);
    let renamed: Vec<Cow<'a, Node>> = nodes
        .iter()
        .map(|node| {
            let data = downstream
                .contains(&node.id)
                .then(|| rename_in_map(&node.data, old, new))
                .flatten();
            match data {
                Some(data) => Cow::Owned(Node { id: node.id.clone(), node_type: node.node_type, data }),
                None => Cow::Borrowed(node),
            }
        })
        .collect();

    let changed = renamed.iter().filter(|n| matches!(n, Cow::Owned(_))).count();
    debug!(source, old, new, changed, "propagating variable rename");
    renamed
}

/// Rewrite `old` to `new` inside a JSON value; `None` when nothing changed.
pub fn rename_in_value(value: &Value, old: &str, new: &str) -> Option<Value> {
    match value {
        Value::String(s) => match template::rename_variable(s, old, new) {
            Cow::Owned(renamed) => Some(Value::String(renamed)),
            Cow::Borrowed(_) => None,
        },
        Value::Array(items) => {
            let renamed: Vec<Option<Value>> = items.iter().map(|v| rename_in_value(v, old, new)).collect();
            if renamed.iter().all(Option::is_none) {
                return None;
            }
            Some(Value::Array(
                renamed
                    .into_iter()
                    .zip(items)
                    .map(|(changed, original)| changed.unwrap_or_else(|| original.clone()))
                    .collect(),
            ))
        }
        Value::Object(map) => rename_in_map(map, old, new).map(Value::Object),
        _ => None,
    }
}

fn rename_in_map(map: &Map<String, Value>, old: &str, new: &str) -> Option<Map<String, Value>> {
    let mut changed = false;
    let renamed: Map<String, Value> = map
        .iter()
        .map(|(k, v)| {
            let value = match rename_in_value(v, old, new) {
                Some(value) => {
                    changed = true;
                    value
                }
                None => v.clone(),
            };
            (k.clone(), value)
        })
        .collect();
    changed.then_some(renamed)
}

impl Workflow {
    /// Give `node_id` a new `variableName` and rewrite downstream references.
    ///
    /// The document is not mutated; the renamed copy is returned.
    ///
    /// # Errors
    /// - [`EngineError::UnknownNode`] if `node_id` is not in the workflow.
    /// - [`EngineError::InvalidNodeConfig`] if `new_name` is blank.
    /// - [`EngineError::DuplicateVariableName`] if another node already uses it.
    pub fn rename_variable(&self, node_id: &str, new_name: &str) -> Result<Workflow, EngineError> {
        let position = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))?;

        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(EngineError::InvalidNodeConfig {
                node_id: node_id.to_owned(),
                message: "variable name cannot be empty".into(),
            });
        }
        if let Some(other) = self
            .nodes
            .iter()
            .find(|n| n.id != node_id && n.variable_name() == Some(new_name))
        {
            return Err(EngineError::DuplicateVariableName {
                name: new_name.to_owned(),
                first: other.id.clone(),
                second: node_id.to_owned(),
            });
        }

        let old_name = self.nodes[position].variable_name().map(str::to_owned);
        let mut nodes: Vec<Node> = match old_name.as_deref() {
            Some(old) => propagate_rename(node_id, old, new_name, &self.nodes, &self.edges)
                .into_iter()
                .map(Cow::into_owned)
                .collect(),
            None => self.nodes.clone(),
        };
        nodes[position]
            .data
            .insert(VARIABLE_NAME_KEY.to_owned(), Value::String(new_name.to_owned()));

        Ok(Workflow { nodes, ..self.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::NodeType;
    use serde_json::json;

    fn form_workflow() -> Workflow {
        Workflow::new(
            "lead intake",
            vec![
                Node::new("a", NodeType::GoogleFormTrigger, json!({ "variableName": "form" })),
                Node::new("b", NodeType::GmailSend, json!({
                    "to": "{{form.responses.Email}}",
                    "subject": "Hi {{ form.responses.Name }}",
                    "body": "{{json form}} from {{formData.source}}"
                })),
                Node::new("c", NodeType::SetVariables, json!({
                    "values": { "copy": ["{{form.responses.Email}}", 7, "plain"] }
                })),
                Node::new("side", NodeType::SlackMessage, json!({ "content": "{{form.x}}" })),
            ],
            vec![Edge::new("a", "b"), Edge::new("b", "c")],
        )
    }

    fn borrows(result: &Cow<'_, Node>, original: &Node) -> bool {
        matches!(result, Cow::Borrowed(node) if std::ptr::eq(*node, original))
    }

    #[test]
    fn rewrites_downstream_and_leaves_source_untouched() {
        let wf = form_workflow();
        let result = propagate_rename("a", "form", "googleForm", &wf.nodes, &wf.edges);

        assert_eq!(result.len(), wf.nodes.len());
        assert!(borrows(&result[0], &wf.nodes[0]), "source node must be the input element");
        assert!(matches!(result[1], Cow::Owned(_)));
        assert_eq!(result[1].data["to"], "{{googleForm.responses.Email}}");
        assert_eq!(result[1].data["subject"], "Hi {{ googleForm.responses.Name }}");
        assert_eq!(result[1].data["body"], "{{json googleForm}} from {{formData.source}}");
        assert_eq!(result[2].data["values"]["copy"], json!(["{{googleForm.responses.Email}}", 7, "plain"]));
    }

    #[test]
    fn nodes_outside_the_downstream_set_are_borrowed() {
        let wf = form_workflow();
        let result = propagate_rename("a", "form", "googleForm", &wf.nodes, &wf.edges);
        assert!(borrows(&result[3], &wf.nodes[3]));
    }

    #[test]
    fn downstream_node_without_references_is_borrowed() {
        let mut wf = form_workflow();
        wf.nodes.push(Node::new("d", NodeType::SlackMessage, json!({ "content": "static" })));
        wf.edges.push(Edge::new("c", "d"));

        let result = propagate_rename("a", "form", "googleForm", &wf.nodes, &wf.edges);
        assert!(borrows(&result[4], &wf.nodes[4]));
    }

    #[test]
    fn same_name_borrows_every_node() {
        let wf = form_workflow();
        let result = propagate_rename("a", "form", "form", &wf.nodes, &wf.edges);
        assert!(result.iter().zip(&wf.nodes).all(|(r, n)| borrows(r, n)));
    }

    #[test]
    fn unreferenced_name_borrows_every_node() {
        let wf = form_workflow();
        let result = propagate_rename("a", "stripe", "payment", &wf.nodes, &wf.edges);
        assert!(result.iter().zip(&wf.nodes).all(|(r, n)| borrows(r, n)));
    }

    #[test]
    fn prefix_sharing_names_survive() {
        let value = json!({ "a": "{{formData.a}}", "b": "{{forms}}", "c": "{{ form }}" });
        let renamed = rename_in_value(&value, "form", "googleForm").unwrap();
        assert_eq!(renamed, json!({ "a": "{{formData.a}}", "b": "{{forms}}", "c": "{{ googleForm }}" }));
    }

    #[test]
    fn workflow_rename_updates_producer_and_consumers() {
        let wf = form_workflow();
        let renamed = wf.rename_variable("a", " googleForm ").unwrap();

        assert_eq!(renamed.id, wf.id);
        assert_eq!(renamed.node("a").unwrap().variable_name(), Some("googleForm"));
        assert_eq!(renamed.node("b").unwrap().data["to"], "{{googleForm.responses.Email}}");
        assert_eq!(renamed.node("side").unwrap(), wf.node("side").unwrap());
        // The original document is untouched.
        assert_eq!(wf.node("a").unwrap().variable_name(), Some("form"));
    }

    #[test]
    fn workflow_rename_rejects_taken_and_blank_names() {
        let mut wf = form_workflow();
        wf.nodes[2].data.insert("variableName".into(), json!("vars"));

        assert!(matches!(
            wf.rename_variable("a", "vars"),
            Err(EngineError::DuplicateVariableName { first, .. }) if first == "c"
        ));
        assert!(matches!(wf.rename_variable("a", "  "), Err(EngineError::InvalidNodeConfig { .. })));
        assert!(matches!(wf.rename_variable("ghost", "x"), Err(EngineError::UnknownNode(_))));
    }

    #[test]
    fn naming_a_node_for_the_first_time_rewrites_nothing() {
        let wf = form_workflow();
        let renamed = wf.rename_variable("b", "email").unwrap();
        assert_eq!(renamed.node("b").unwrap().variable_name(), Some("email"));
        assert_eq!(renamed.node("c").unwrap(), wf.node("c").unwrap());
    }
}
