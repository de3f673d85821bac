//! Durable steps.
//!
//! Every side effect inside an executor runs as a named step. Once a step has
//! completed within a run its result is persisted under a [`StepKey`]; if the
//! run is retried or resumed later, the stored result is replayed instead of
//! repeating the external call.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::NodeError;

/// Step names starting with this prefix belong to the runtime.
pub const RESERVED_PREFIX: &str = "__";

/// Step under which the runtime memoizes a node's final output.
pub const NODE_OUTPUT_STEP: &str = "__node_output";

/// Stable identity of a step result: unique per (run, node, step name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepKey {
    pub run_id: Uuid,
    pub node_id: String,
    pub step: String,
}

impl StepKey {
    pub fn new(run_id: Uuid, node_id: impl Into<String>, step: impl Into<String>) -> Self {
        Self { run_id, node_id: node_id.into(), step: step.into() }
    }

    pub fn node_output(run_id: Uuid, node_id: impl Into<String>) -> Self {
        Self::new(run_id, node_id, NODE_OUTPUT_STEP)
    }
}

/// Persistence for completed step results.
///
/// Store failures surface as [`NodeError::Retryable`].
#[async_trait]
pub trait StepStore: Send + Sync {
    async fn load(&self, key: &StepKey) -> Result<Option<Value>, NodeError>;
    async fn save(&self, key: &StepKey, output: &Value) -> Result<(), NodeError>;
}

/// Process-local step store.
#[derive(Debug, Default)]
pub struct InMemoryStepStore {
    results: Mutex<HashMap<StepKey, Value>>,
}

impl InMemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &StepKey) -> bool {
        self.results.lock().map(|r| r.contains_key(key)).unwrap_or(false)
    }
}

#[async_trait]
impl StepStore for InMemoryStepStore {
    async fn load(&self, key: &StepKey) -> Result<Option<Value>, NodeError> {
        let results = self
            .results
            .lock()
            .map_err(|_| NodeError::retryable("step store lock poisoned"))?;
        Ok(results.get(key).cloned())
    }

    async fn save(&self, key: &StepKey, output: &Value) -> Result<(), NodeError> {
        let mut results = self
            .results
            .lock()
            .map_err(|_| NodeError::retryable("step store lock poisoned"))?;
        results.insert(key.clone(), output.clone());
        Ok(())
    }
}

/// Runs the durable steps of one node execution.
///
/// A fresh runner is created for every attempt of a node; step names must be
/// unique within that attempt and stable across retries of the same run.
pub struct StepRunner {
    store: Arc<dyn StepStore>,
    run_id: Uuid,
    node_id: String,
    seen: Mutex<HashSet<String>>,
    executed: AtomicUsize,
    replayed: AtomicUsize,
}

impl StepRunner {
    pub fn new(store: Arc<dyn StepStore>, run_id: Uuid, node_id: impl Into<String>) -> Self {
        Self {
            store,
            run_id,
            node_id: node_id.into(),
            seen: Mutex::new(HashSet::new()),
            executed: AtomicUsize::new(0),
            replayed: AtomicUsize::new(0),
        }
    }

    /// Run `work` as the step `step`, or replay its stored result.
    ///
    /// `work` is only invoked when no result exists for this run/node/step.
    /// Its output is persisted before being returned.
    pub async fn run<T, F, Fut>(&self, step: &str, work: F) -> Result<T, NodeError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, NodeError>> + Send,
    {
        if step.starts_with(RESERVED_PREFIX) {
            return Err(NodeError::non_retriable(format!(
                "step name '{step}' uses the reserved '{RESERVED_PREFIX}' prefix"
            )));
        }
        {
            let mut seen = self
                .seen
                .lock()
                .map_err(|_| NodeError::retryable("step registry lock poisoned"))?;
            if !seen.insert(step.to_owned()) {
                return Err(NodeError::non_retriable(format!(
                    "step '{step}' ran twice in node '{}'",
                    self.node_id
                )));
            }
        }

        let key = StepKey::new(self.run_id, self.node_id.as_str(), step);

        if let Some(stored) = self.store.load(&key).await? {
            debug!(node_id = %self.node_id, step, "replaying completed step");
            self.replayed.fetch_add(1, Ordering::Relaxed);
            return serde_json::from_value(stored).map_err(|e| {
                NodeError::non_retriable(format!("stored result of step '{step}' has the wrong shape: {e}"))
            });
        }

        let output = work().await?;
        let value = serde_json::to_value(&output).map_err(|e| {
            NodeError::non_retriable(format!("result of step '{step}' is not serialisable: {e}"))
        })?;
        self.store.save(&key, &value).await?;
        self.executed.fetch_add(1, Ordering::Relaxed);
        debug!(node_id = %self.node_id, step, "step completed");

        Ok(output)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Steps whose `work` actually ran in this attempt.
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::Relaxed)
    }

    /// Steps answered from the store in this attempt.
    pub fn replayed(&self) -> usize {
        self.replayed.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for StepRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRunner")
            .field("run_id", &self.run_id)
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}
