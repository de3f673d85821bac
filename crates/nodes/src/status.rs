//! Per-node execution status and the channel it is published on.
//!
//! Status is the only externally observable side channel besides the context.
//! For one node in one run the published sequence is always
//! `initial → loading → success | error`; a retried attempt starts again at
//! `loading`. Delivery is fire-and-forget: publishers never block or fail the
//! run.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Status of one node within one execution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Not reached (yet) in this run.
    #[default]
    Initial,
    Loading,
    Success,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
            Self::Error   => write!(f, "error"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "loading" => Ok(Self::Loading),
            "success" => Ok(Self::Success),
            "error"   => Ok(Self::Error),
            other     => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub run_id: Uuid,
    pub node_id: String,
    pub status: ExecutionStatus,
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(run_id: Uuid, node_id: impl Into<String>, status: ExecutionStatus) -> Self {
        Self { run_id, node_id: node_id.into(), status, at: Utc::now() }
    }
}

/// Receives status transitions (a live canvas, a log, a test probe, ...).
pub trait StatusPublisher: Send + Sync {
    fn publish(&self, update: StatusUpdate);
}

/// Discards every update.
#[derive(Debug, Clone, Default)]
pub struct NoopPublisher;

impl StatusPublisher for NoopPublisher {
    fn publish(&self, _update: StatusUpdate) {}
}

/// Emits every update as a structured log line.
#[derive(Debug, Clone, Default)]
pub struct TracingPublisher;

impl StatusPublisher for TracingPublisher {
    fn publish(&self, update: StatusUpdate) {
        info!(
            run_id = %update.run_id,
            node_id = %update.node_id,
            status = %update.status,
            "node status"
        );
    }
}

/// Forwards updates to an unbounded channel for an async consumer.
///
/// Unbounded so a slow consumer never stalls the run; volume is a handful of
/// updates per node.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StatusPublisher for ChannelPublisher {
    fn publish(&self, update: StatusUpdate) {
        // A dropped receiver just means nobody is watching.
        let _ = self.sender.send(update);
    }
}

/// Keeps every update in memory. Used by tests and the CLI summary.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// Every status published for `node_id`, in order.
    pub fn history(&self, node_id: &str) -> Vec<ExecutionStatus> {
        self.updates()
            .into_iter()
            .filter(|u| u.node_id == node_id)
            .map(|u| u.status)
            .collect()
    }

    /// What a canvas would currently show for `node_id`.
    pub fn last(&self, node_id: &str) -> ExecutionStatus {
        self.history(node_id).last().copied().unwrap_or_default()
    }

    /// Last status per node.
    pub fn snapshot(&self) -> HashMap<String, ExecutionStatus> {
        self.updates()
            .into_iter()
            .map(|u| (u.node_id, u.status))
            .collect()
    }
}

impl StatusPublisher for RecordingPublisher {
    fn publish(&self, update: StatusUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}
