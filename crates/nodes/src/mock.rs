//! Scriptable executor for runtime tests.
//!
//! Records the context of every call and can fail on demand, including the
//! "side effect done, then crashed" case durable steps exist for.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Context, ExecutableNode, NodeError, NodeInput};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `NonRetriable` error.
    FailNonRetriable(String),
    /// Fail with a `Retryable` error for the first `times` calls, then return
    /// the value.
    FlakyThenReturn { times: usize, value: Value },
    /// Run the durable step `step` (counted in `effects`), then fail with a
    /// `Retryable` error on the first call only.
    StepThenFailOnce { step: String, value: Value },
}

/// A mock node that records every context it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All contexts seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<Context>>>,
    /// Number of times a durable step body actually ran.
    pub effects: Arc<AtomicUsize>,
}

impl MockNode {
    fn with(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
            effects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self::with(name, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always fails with a `NonRetriable` error.
    pub fn failing_non_retriable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with(name, MockBehaviour::FailNonRetriable(msg.into()))
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with(name, MockBehaviour::FailRetryable(msg.into()))
    }

    /// Create a mock that fails `times` times before succeeding.
    pub fn flaky(name: impl Into<String>, times: usize, value: Value) -> Self {
        Self::with(name, MockBehaviour::FlakyThenReturn { times, value })
    }

    /// Create a mock whose first attempt completes a step and then fails.
    pub fn step_then_fail_once(name: impl Into<String>, step: impl Into<String>, value: Value) -> Self {
        Self::with(name, MockBehaviour::StepThenFailOnce { step: step.into(), value })
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Context received on the most recent call.
    pub fn last_context(&self) -> Option<Context> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn effect_count(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Tag the output so tests can trace the data flowing through the run.
    fn output(&self, value: &Value) -> Value {
        let mut out = json!({ "node": self.name });
        if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), value.as_object()) {
            for (k, val) in v_obj {
                out_obj.insert(k.clone(), val.clone());
            }
        }
        out
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    async fn execute(&self, input: &NodeInput<'_>) -> Result<Value, NodeError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(input.context.clone());
            calls.len()
        };

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(self.output(v)),
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FailNonRetriable(msg) => Err(NodeError::NonRetriable(msg.clone())),
            MockBehaviour::FlakyThenReturn { times, value } => {
                if call <= *times {
                    Err(NodeError::retryable(format!("{} flaked on call {call}", self.name)))
                } else {
                    Ok(self.output(value))
                }
            }
            MockBehaviour::StepThenFailOnce { step, value } => {
                let effects = self.effects.clone();
                let receipt: Value = input
                    .steps
                    .run(step, || async move {
                        let n = effects.fetch_add(1, Ordering::SeqCst) + 1;
                        Ok(json!({ "effect": n }))
                    })
                    .await?;
                if call == 1 {
                    return Err(NodeError::retryable(format!("{} failed after '{step}'", self.name)));
                }
                let mut out = self.output(value);
                if let Some(obj) = out.as_object_mut() {
                    obj.insert("receipt".into(), receipt);
                }
                Ok(out)
            }
        }
    }
}
