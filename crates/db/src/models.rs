//! Rows of `workflow_runs` and `step_results`.
//!
//! Plain data; the engine's types never leak into the schema.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// Lifecycle of a whole run, as stored in `workflow_runs.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running"   => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed"    => Ok(Self::Failed),
            other       => Err(format!("unknown run status: {other}")),
        }
    }
}

/// A persisted workflow run row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRunRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    /// Payload the run was started with; needed to resume it.
    pub trigger: serde_json::Value,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRunRow {
    pub fn run_status(&self) -> Result<RunStatus, String> {
        self.status.parse()
    }
}

// ---------------------------------------------------------------------------
// step_results
// ---------------------------------------------------------------------------

/// A completed durable step.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StepResultRow {
    pub run_id: Uuid,
    pub node_id: String,
    pub step: String,
    pub output: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}
