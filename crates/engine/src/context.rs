//! Design-time context builder.
//!
//! Answers "which variables can this node reference?" for the editor's
//! autocomplete. The examples are representative shapes per node kind, not
//! live values: nothing here touches a run.

use std::collections::HashSet;

use nodes::{Context, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::graph::Graph;
use crate::models::{Edge, Node};

/// Namespace injected for bundles whose parent context is not known yet.
pub const PARENT_PLACEHOLDER: &str = "parentWorkflow";

/// One top-level name a template may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableNamespace {
    pub name: String,
    pub example: Value,
    pub source: NamespaceSource,
}

/// Where a namespace comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NamespaceSource {
    /// Output of an upstream node.
    Upstream {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "nodeType")]
        node_type: NodeType,
    },
    /// A declared input of the bundle being edited.
    BundleInput,
    /// Variables inherited from a workflow that embeds this bundle.
    ParentWorkflow,
}

// ---------------------------------------------------------------------------
// Bundle options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleInputType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl BundleInputType {
    fn placeholder(self) -> Value {
        match self {
            Self::String => json!(""),
            Self::Number => json!(0),
            Self::Boolean => json!(false),
            Self::Object => json!({}),
            Self::Array => json!([]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleInput {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: BundleInputType,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentWorkflowContext {
    pub workflow_name: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// Extra context available when the workflow being edited is a bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleOptions {
    pub is_bundle: bool,
    pub inputs: Vec<BundleInput>,
    pub parents: Vec<ParentWorkflowContext>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Every namespace visible to `node_id`.
///
/// Upstream producers come first in document order, then bundle inputs, then
/// parent workflows. When two sources claim the same name the first one wins.
/// A node never sees its own output.
pub fn build_context(
    node_id: &str,
    nodes: &[Node],
    edges: &[Edge],
    bundle: Option<&BundleOptions>,
) -> Vec<VariableNamespace> {
    let upstream = Graph::new(nodes, edges).upstream_of(node_id);
    let mut taken: HashSet<String> = HashSet::new();
    let mut namespaces = Vec::new();

    let mut push = |namespace: VariableNamespace| {
        if taken.insert(namespace.name.clone()) {
            namespaces.push(namespace);
        }
    };

    for node in nodes.iter().filter(|n| upstream.contains(&n.id)) {
        let Some(name) = node.variable_name() else { continue };
        push(VariableNamespace {
            name: name.to_owned(),
            example: example_output(node),
            source: NamespaceSource::Upstream {
                node_id: node.id.clone(),
                node_type: node.node_type,
            },
        });
    }

    if let Some(bundle) = bundle.filter(|b| b.is_bundle) {
        for input in &bundle.inputs {
            push(VariableNamespace {
                name: input.name.clone(),
                example: input.default.clone().unwrap_or_else(|| input.input_type.placeholder()),
                source: NamespaceSource::BundleInput,
            });
        }

        if bundle.parents.is_empty() {
            push(VariableNamespace {
                name: PARENT_PLACEHOLDER.to_owned(),
                example: json!({ "exampleVariable": { "id": "example-id", "success": true } }),
                source: NamespaceSource::ParentWorkflow,
            });
        }
        for parent in &bundle.parents {
            push(VariableNamespace {
                name: parent.workflow_name.clone(),
                example: Value::Object(parent.variables.clone()),
                source: NamespaceSource::ParentWorkflow,
            });
        }
    }

    namespaces
}

/// Fold namespaces into a context, e.g. to preview a template.
pub fn example_context(namespaces: &[VariableNamespace]) -> Context {
    namespaces
        .iter()
        .map(|ns| (ns.name.clone(), ns.example.clone()))
        .collect()
}

/// Representative output of `node`, shaped like what its executor returns.
pub fn example_output(node: &Node) -> Value {
    match node.node_type {
        NodeType::ManualTrigger => json!({
            "triggeredAt": "2024-01-01T09:00:00Z",
            "source": "manual"
        }),
        NodeType::GoogleFormTrigger => json!({
            "formId": "form-123",
            "formTitle": "Contact form",
            "responseId": "response-456",
            "timestamp": "2024-01-01T09:00:00Z",
            "respondentEmail": "jane@example.com",
            "responses": {
                "Name": "Jane Doe",
                "Email": "jane@example.com"
            }
        }),
        NodeType::StripeTrigger => json!({
            "eventId": "evt_123",
            "eventType": "checkout.session.completed",
            "timestamp": "2024-01-01T09:00:00Z",
            "livemode": false,
            "customer": { "email": "jane@example.com", "name": "Jane Doe" },
            "amount": 4900,
            "currency": "usd"
        }),
        NodeType::WebhookTrigger => json!({
            "method": "POST",
            "headers": { "content-type": "application/json" },
            "query": {},
            "body": {}
        }),
        NodeType::HttpRequest => json!({
            "httpResponse": { "status": 200, "statusText": "OK", "data": {} }
        }),
        NodeType::GmailSend => json!({
            "messageId": "msg-123",
            "threadId": "thread-123",
            "to": "jane@example.com",
            "subject": "Welcome",
            "sentAt": "2024-01-01T09:00:00Z"
        }),
        NodeType::SlackMessage => json!({ "messageContent": "Hello from the workflow" }),
        NodeType::CreateContact => json!({
            "contact": {
                "id": "contact-123",
                "name": "Jane Doe",
                "email": "jane@example.com",
                "phone": null,
                "company": "Acme"
            },
            "created": true
        }),
        NodeType::UpdateDealStage => json!({
            "deal": { "id": "deal-123", "stage": "won", "previousStage": "proposal" },
            "success": true
        }),
        NodeType::SetVariables => match node.data.get("values") {
            Some(Value::Object(values)) if !values.is_empty() => Value::Object(values.clone()),
            _ => generic_output(node),
        },
        NodeType::Bundle => generic_output(node),
    }
}

fn generic_output(node: &Node) -> Value {
    json!({ "id": node.id, "success": true })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(namespaces: &[VariableNamespace]) -> Vec<&str> {
        namespaces.iter().map(|n| n.name.as_str()).collect()
    }

    fn chain() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::new("a", NodeType::GoogleFormTrigger, json!({ "variableName": "form" })),
            Node::new("b", NodeType::SlackMessage, json!({ "content": "{{form.responses.Name}}" })),
            Node::new("c", NodeType::CreateContact, json!({ "variableName": "contact" })),
        ];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c")];
        (nodes, edges)
    }

    #[test]
    fn linear_chain_only_shows_named_producers() {
        let (nodes, edges) = chain();
        let ctx = build_context("c", &nodes, &edges, None);

        assert_eq!(names(&ctx), vec!["form"]);
        assert_eq!(ctx[0].example["responses"]["Email"], "jane@example.com");
        assert_eq!(
            ctx[0].source,
            NamespaceSource::Upstream { node_id: "a".into(), node_type: NodeType::GoogleFormTrigger }
        );
    }

    #[test]
    fn trigger_sees_nothing() {
        let (nodes, edges) = chain();
        assert!(build_context("a", &nodes, &edges, None).is_empty());
    }

    #[test]
    fn node_never_sees_itself_even_through_a_cycle() {
        let (nodes, mut edges) = chain();
        edges.push(Edge::new("c", "a"));
        let ctx = build_context("c", &nodes, &edges, None);
        assert_eq!(names(&ctx), vec!["form"]);
    }

    #[test]
    fn unmapped_kind_degrades_to_generic_shape() {
        let nodes = vec![
            Node::new("sub", NodeType::Bundle, json!({ "variableName": "enrichment" })),
            Node::new("vars", NodeType::SetVariables, json!({ "variableName": "empty" })),
            Node::new("next", NodeType::SlackMessage, Value::Null),
        ];
        let edges = vec![Edge::new("sub", "vars"), Edge::new("vars", "next")];
        let ctx = build_context("next", &nodes, &edges, None);

        assert_eq!(ctx[0].example, json!({ "id": "sub", "success": true }));
        assert_eq!(ctx[1].example, json!({ "id": "vars", "success": true }));
    }

    #[test]
    fn set_variables_example_is_its_own_values() {
        let nodes = vec![
            Node::new("vars", NodeType::SetVariables, json!({
                "variableName": "lead",
                "values": { "tier": "gold" }
            })),
            Node::new("next", NodeType::SlackMessage, Value::Null),
        ];
        let edges = vec![Edge::new("vars", "next")];
        let ctx = build_context("next", &nodes, &edges, None);
        assert_eq!(ctx[0].example, json!({ "tier": "gold" }));
    }

    #[test]
    fn bundle_inputs_and_placeholder_parent() {
        let (nodes, edges) = chain();
        let options = BundleOptions {
            is_bundle: true,
            inputs: vec![
                BundleInput { name: "email".into(), input_type: BundleInputType::String, default: None },
                BundleInput {
                    name: "score".into(),
                    input_type: BundleInputType::Number,
                    default: Some(json!(42)),
                },
            ],
            parents: vec![],
        };

        let ctx = build_context("b", &nodes, &edges, Some(&options));

        assert_eq!(names(&ctx), vec!["form", "email", "score", PARENT_PLACEHOLDER]);
        assert_eq!(ctx[1].example, json!(""));
        assert_eq!(ctx[2].example, json!(42));
        assert_eq!(ctx[3].source, NamespaceSource::ParentWorkflow);
    }

    #[test]
    fn known_parents_replace_the_placeholder() {
        let options: BundleOptions = serde_json::from_value(json!({
            "isBundle": true,
            "parents": [
                { "workflowName": "Lead intake", "variables": { "form": { "email": "a@b.c" } } }
            ]
        }))
        .unwrap();

        let ctx = build_context("a", &[], &[], Some(&options));

        assert_eq!(names(&ctx), vec!["Lead intake"]);
        assert_eq!(ctx[0].example["form"]["email"], "a@b.c");
    }

    #[test]
    fn bundle_options_ignored_unless_flagged() {
        let options = BundleOptions {
            is_bundle: false,
            inputs: vec![BundleInput { name: "x".into(), input_type: BundleInputType::Array, default: None }],
            parents: vec![],
        };
        assert!(build_context("a", &[], &[], Some(&options)).is_empty());
    }

    #[test]
    fn first_claim_on_a_name_wins() {
        let (nodes, edges) = chain();
        let options = BundleOptions {
            is_bundle: true,
            inputs: vec![BundleInput { name: "form".into(), input_type: BundleInputType::Object, default: None }],
            parents: vec![ParentWorkflowContext { workflow_name: "p".into(), variables: Map::new() }],
        };

        let ctx = build_context("c", &nodes, &edges, Some(&options));

        assert_eq!(names(&ctx), vec!["form", "p"]);
        assert!(matches!(ctx[0].source, NamespaceSource::Upstream { .. }));
    }

    #[test]
    fn example_context_resolves_templates() {
        let (nodes, edges) = chain();
        let ctx = example_context(&build_context("c", &nodes, &edges, None));
        assert_eq!(nodes::template::resolve("Hi {{form.responses.Name}}", &ctx), "Hi Jane Doe");
    }
}
