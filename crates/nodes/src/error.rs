//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node's `execute` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable`: presumed transient. The run may be retried and resumes
///   from the first incomplete durable step.
/// - `NonRetriable`: the configuration can never succeed as-is. The run is
///   terminated immediately without spending retry budget.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Transient failure (network timeout, rate limit, store hiccup, ...).
    #[error("retryable node error: {0}")]
    Retryable(String),

    /// Bad or missing configuration that needs a human to fix it.
    #[error("non-retriable node error: {0}")]
    NonRetriable(String),
}

impl NodeError {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn non_retriable(msg: impl Into<String>) -> Self {
        Self::NonRetriable(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::NonRetriable(msg) => msg,
        }
    }
}

impl From<anyhow::Error> for NodeError {
    /// Anything an executor bubbles up through `anyhow` is presumed transient.
    fn from(err: anyhow::Error) -> Self {
        Self::Retryable(format!("{err:#}"))
    }
}
