//! The closed set of node kinds a workflow canvas can contain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of a workflow node. Every kind maps to exactly one executor in the
/// engine's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    // ------ Triggers ------
    ManualTrigger,
    GoogleFormTrigger,
    StripeTrigger,
    WebhookTrigger,

    // ------ Actions ------
    HttpRequest,
    GmailSend,
    SlackMessage,
    CreateContact,
    UpdateDealStage,
    SetVariables,
    /// Embeds a reusable sub-workflow.
    Bundle,
}

impl NodeType {
    pub const ALL: [NodeType; 11] = [
        Self::ManualTrigger,
        Self::GoogleFormTrigger,
        Self::StripeTrigger,
        Self::WebhookTrigger,
        Self::HttpRequest,
        Self::GmailSend,
        Self::SlackMessage,
        Self::CreateContact,
        Self::UpdateDealStage,
        Self::SetVariables,
        Self::Bundle,
    ];

    /// Whether this node starts a workflow rather than reacting to one.
    pub fn is_trigger(self) -> bool {
        matches!(
            self,
            Self::ManualTrigger | Self::GoogleFormTrigger | Self::StripeTrigger | Self::WebhookTrigger
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualTrigger     => "MANUAL_TRIGGER",
            Self::GoogleFormTrigger => "GOOGLE_FORM_TRIGGER",
            Self::StripeTrigger     => "STRIPE_TRIGGER",
            Self::WebhookTrigger    => "WEBHOOK_TRIGGER",
            Self::HttpRequest       => "HTTP_REQUEST",
            Self::GmailSend         => "GMAIL_SEND",
            Self::SlackMessage      => "SLACK_MESSAGE",
            Self::CreateContact     => "CREATE_CONTACT",
            Self::UpdateDealStage   => "UPDATE_DEAL_STAGE",
            Self::SetVariables      => "SET_VARIABLES",
            Self::Bundle            => "BUNDLE",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown node type: {s}"))
    }
}
