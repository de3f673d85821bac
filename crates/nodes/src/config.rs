//! Typed node configuration.
//!
//! On the canvas a node's `data` is a free-form JSON object. `NodeConfig` is
//! the typed view of it: one concrete shape per [`NodeType`]. Every field is
//! optional because a half-configured node is still a valid document; required
//! fields are checked by the executor at run time, after template resolution.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{NodeError, NodeType};

/// Key under which a node's output becomes visible to its descendants.
pub const VARIABLE_NAME_KEY: &str = "variableName";

/// Typed configuration, tagged by node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeConfig {
    ManualTrigger(TriggerConfig),
    GoogleFormTrigger(GoogleFormTriggerConfig),
    StripeTrigger(TriggerConfig),
    WebhookTrigger(WebhookTriggerConfig),
    HttpRequest(HttpRequestConfig),
    GmailSend(GmailSendConfig),
    SlackMessage(SlackMessageConfig),
    CreateContact(CreateContactConfig),
    UpdateDealStage(UpdateDealStageConfig),
    SetVariables(SetVariablesConfig),
    Bundle(BundleConfig),
}

impl NodeConfig {
    /// Parse the typed configuration of a node from its kind and raw `data`.
    pub fn parse(node_type: NodeType, data: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "type": node_type, "data": data }))
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Self::ManualTrigger(_)     => NodeType::ManualTrigger,
            Self::GoogleFormTrigger(_) => NodeType::GoogleFormTrigger,
            Self::StripeTrigger(_)     => NodeType::StripeTrigger,
            Self::WebhookTrigger(_)    => NodeType::WebhookTrigger,
            Self::HttpRequest(_)       => NodeType::HttpRequest,
            Self::GmailSend(_)         => NodeType::GmailSend,
            Self::SlackMessage(_)      => NodeType::SlackMessage,
            Self::CreateContact(_)     => NodeType::CreateContact,
            Self::UpdateDealStage(_)   => NodeType::UpdateDealStage,
            Self::SetVariables(_)      => NodeType::SetVariables,
            Self::Bundle(_)            => NodeType::Bundle,
        }
    }
}

/// Deserialize a single config struct straight out of a node's `data`.
///
/// A shape mismatch is a configuration problem, so it maps to
/// [`NodeError::NonRetriable`].
pub fn parse_config<T: DeserializeOwned>(data: &Map<String, Value>) -> Result<T, NodeError> {
    serde_json::from_value(Value::Object(data.clone()))
        .map_err(|e| NodeError::non_retriable(format!("invalid node configuration: {e}")))
}

/// Read the `variableName` slot of a node's data, ignoring blanks.
pub fn variable_name(data: &Map<String, Value>) -> Option<&str> {
    data.get(VARIABLE_NAME_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerConfig {
    pub variable_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleFormTriggerConfig {
    pub variable_name: Option<String>,
    pub form_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookTriggerConfig {
    pub variable_name: Option<String>,
    /// URL path segment that identifies this workflow.
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRequestConfig {
    pub variable_name: Option<String>,
    pub endpoint: Option<String>,
    pub method: HttpMethod,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GmailSendConfig {
    pub variable_name: Option<String>,
    pub credential_id: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlackMessageConfig {
    pub variable_name: Option<String>,
    pub webhook_url: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateContactConfig {
    pub variable_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDealStageConfig {
    pub variable_name: Option<String>,
    pub deal_id: Option<String>,
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetVariablesConfig {
    pub variable_name: Option<String>,
    /// Output fields; string leaves are templates.
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleConfig {
    pub variable_name: Option<String>,
    pub bundle_workflow_id: Option<String>,
    /// Values bound to the bundle's declared inputs; string leaves are templates.
    pub inputs: Map<String, Value>,
}
