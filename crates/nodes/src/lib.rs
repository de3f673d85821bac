//! `nodes` crate: the executor contract and built-in node implementations.
//!
//! Every node kind must be served by an [`ExecutableNode`]. The engine crate
//! dispatches execution through this trait object, handing each invocation a
//! [`NodeInput`] with the accumulated [`Context`] and a durable [`StepRunner`].

pub mod builtin;
pub mod config;
pub mod context;
pub mod error;
pub mod kind;
pub mod mock;
pub mod status;
pub mod step;
pub mod template;
pub mod traits;

pub use config::NodeConfig;
pub use context::Context;
pub use error::NodeError;
pub use kind::NodeType;
pub use status::{ExecutionStatus, StatusPublisher, StatusUpdate};
pub use step::{InMemoryStepStore, StepKey, StepRunner, StepStore};
pub use traits::{ExecutableNode, NodeInput};
