//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Validates the DAG and produces a topological ordering.
//! 2. Iterates through nodes in order, dispatching each via `ExecutableNode`.
//! 3. Merges each node's output into the context under its `variableName`.
//! 4. Publishes `loading`/`success`/`error` around every node invocation.
//! 5. Retries the run on `NodeError::Retryable` (up to `max_retries`) and
//!    aborts immediately on `NodeError::NonRetriable`.
//!
//! Completed nodes and their durable steps are persisted in the step store,
//! so a retried or resumed run picks up at the node that failed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nodes::builtin::{CreateContactNode, RecordStore, SetVariablesNode, TriggerNode};
use nodes::{
    Context, ExecutableNode, ExecutionStatus, NodeError, NodeInput, NodeType, StatusPublisher,
    StatusUpdate, StepKey, StepRunner, StepStore,
};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::dag::{validate_dag, validate_registry};
use crate::models::Node;
use crate::{EngineError, Workflow};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Retry budget and back-off for a run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of times a run is retried after a retryable failure.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

impl ExecutorConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

// ---------------------------------------------------------------------------
// Node registry
// ---------------------------------------------------------------------------

/// Maps each node kind to the executor that serves it.
pub type NodeRegistry = HashMap<NodeType, Arc<dyn ExecutableNode>>;

/// Registry with every executor that needs no third-party integration.
pub fn builtin_registry(records: Arc<dyn RecordStore>) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for kind in NodeType::ALL.into_iter().filter(|k| k.is_trigger()) {
        registry.insert(kind, Arc::new(TriggerNode));
    }
    registry.insert(NodeType::SetVariables, Arc::new(SetVariablesNode));
    registry.insert(NodeType::CreateContact, Arc::new(CreateContactNode::new(records)));
    registry
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// The result of running a full workflow.
#[derive(Debug)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    /// Every published output, keyed by variable name.
    pub context: Context,
    /// Number of passes over the workflow, the successful one included.
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Orchestrator that runs workflow executions.
///
/// Holds no per-run state: everything a run needs to survive a crash lives in
/// the step store, keyed by run id.
pub struct WorkflowExecutor {
    registry: NodeRegistry,
    steps: Arc<dyn StepStore>,
    publisher: Arc<dyn StatusPublisher>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(
        registry: NodeRegistry,
        steps: Arc<dyn StepStore>,
        publisher: Arc<dyn StatusPublisher>,
        config: ExecutorConfig,
    ) -> Self {
        Self { registry, steps, publisher, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Start a new run of `workflow`.
    ///
    /// Every node is published as `initial` before the first one starts.
    ///
    /// # Errors
    /// Returns `EngineError` for validation failures, non-retriable node
    /// errors, or retry exhaustion.
    pub async fn run(&self, workflow: &Workflow, trigger: Value) -> Result<ExecutionResult, EngineError> {
        self.start(Uuid::new_v4(), workflow, trigger).await
    }

    /// Start a new run under a caller-chosen id, e.g. one already recorded
    /// in a runs table.
    pub async fn start(
        &self,
        run_id: Uuid,
        workflow: &Workflow,
        trigger: Value,
    ) -> Result<ExecutionResult, EngineError> {
        let order = self.prepare(workflow)?;
        for node in &workflow.nodes {
            self.publish(run_id, &node.id, ExecutionStatus::Initial);
        }
        self.execute(run_id, workflow, &order, &trigger).await
    }

    /// Continue an existing run, e.g. after a process restart.
    ///
    /// Nodes that completed under `run_id` are not executed again, and the
    /// completed steps of the node that was interrupted are replayed.
    ///
    /// Observers attached after the crash get the full picture: every node
    /// is published as `initial`, then each completed node as `loading` and
    /// `success`, before execution continues.
    pub async fn resume(
        &self,
        run_id: Uuid,
        workflow: &Workflow,
        trigger: Value,
    ) -> Result<ExecutionResult, EngineError> {
        let order = self.prepare(workflow)?;
        for node in &workflow.nodes {
            self.publish(run_id, &node.id, ExecutionStatus::Initial);
        }

        let mut completed = 0usize;
        for node_id in &order {
            // A failed lookup resurfaces when the node is invoked.
            if let Ok(Some(_)) = self.steps.load(&StepKey::node_output(run_id, node_id.as_str())).await {
                self.publish(run_id, node_id, ExecutionStatus::Loading);
                self.publish(run_id, node_id, ExecutionStatus::Success);
                completed += 1;
            }
        }
        info!(%run_id, completed, "resuming run");

        self.execute(run_id, workflow, &order, &trigger).await
    }

    fn prepare(&self, workflow: &Workflow) -> Result<Vec<String>, EngineError> {
        let order = validate_dag(workflow)?;
        validate_registry(workflow, &self.registry)?;
        Ok(order)
    }

    #[instrument(skip_all, fields(workflow_id = %workflow.id, run_id = %run_id))]
    async fn execute(
        &self,
        run_id: Uuid,
        workflow: &Workflow,
        order: &[String],
        trigger: &Value,
    ) -> Result<ExecutionResult, EngineError> {
        info!(nodes = order.len(), ?order, "DAG validated, executing");

        let mut attempt = 1u32;
        loop {
            match self.attempt(run_id, workflow, order, trigger).await {
                Ok(context) => {
                    info!(attempts = attempt, "workflow run succeeded");
                    return Ok(ExecutionResult { run_id, context, attempts: attempt });
                }

                Err((node_id, NodeError::NonRetriable(message))) => {
                    error!(node_id = %node_id, error = %message, "node failed, run terminated");
                    return Err(EngineError::NodeNonRetriable { node_id, message });
                }

                Err((node_id, NodeError::Retryable(message))) => {
                    if attempt > self.config.max_retries {
                        error!(node_id = %node_id, error = %message, attempts = attempt, "retries exhausted");
                        return Err(EngineError::NodeRetryExhausted { node_id, message, attempts: attempt });
                    }

                    let delay = self.config.backoff(attempt);
                    warn!(
                        node_id = %node_id, error = %message,
                        "retryable error (attempt {}/{}), retrying in {:?}",
                        attempt, self.config.max_retries + 1, delay
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: one pass over the workflow in topological order.
    // -----------------------------------------------------------------------

    async fn attempt(
        &self,
        run_id: Uuid,
        workflow: &Workflow,
        order: &[String],
        trigger: &Value,
    ) -> Result<Context, (String, NodeError)> {
        let mut context = Context::new();

        for node_id in order {
            let node = workflow
                .node(node_id)
                .ok_or_else(|| (node_id.clone(), NodeError::non_retriable("node vanished from workflow")))?;

            context = self
                .invoke(run_id, node, &context, trigger)
                .await
                .map_err(|e| (node_id.clone(), e))?;
        }

        Ok(context)
    }

    /// Run one node and return the context its descendants will see.
    async fn invoke(
        &self,
        run_id: Uuid,
        node: &Node,
        context: &Context,
        trigger: &Value,
    ) -> Result<Context, NodeError> {
        let memo = StepKey::node_output(run_id, node.id.as_str());
        if let Some(output) = self.steps.load(&memo).await? {
            return Ok(merge(node, context, output));
        }

        self.publish(run_id, &node.id, ExecutionStatus::Loading);

        match self.execute_node(run_id, node, context, trigger, &memo).await {
            Ok(output) => {
                let next = merge(node, context, output);
                self.publish(run_id, &node.id, ExecutionStatus::Success);
                info!(node_id = %node.id, "node succeeded");
                Ok(next)
            }
            Err(e) => {
                self.publish(run_id, &node.id, ExecutionStatus::Error);
                Err(e)
            }
        }
    }

    async fn execute_node(
        &self,
        run_id: Uuid,
        node: &Node,
        context: &Context,
        trigger: &Value,
        memo: &StepKey,
    ) -> Result<Value, NodeError> {
        let executor = self.registry.get(&node.node_type).ok_or_else(|| {
            NodeError::non_retriable(format!("no executor registered for {}", node.node_type))
        })?;

        let steps = StepRunner::new(self.steps.clone(), run_id, node.id.as_str());
        let input = NodeInput {
            run_id,
            node_id: &node.id,
            node_type: node.node_type,
            data: &node.data,
            context,
            trigger,
            steps: &steps,
        };

        let output = executor.execute(&input).await?;
        self.steps.save(memo, &output).await?;
        Ok(output)
    }

    fn publish(&self, run_id: Uuid, node_id: &str, status: ExecutionStatus) {
        self.publisher.publish(StatusUpdate::new(run_id, node_id, status));
    }
}

/// Publish `output` under the node's variable name; unnamed output is dropped.
fn merge(node: &Node, context: &Context, output: Value) -> Context {
    match node.variable_name() {
        Some(name) => context.with_output(name, output),
        None => context.clone(),
    }
}
