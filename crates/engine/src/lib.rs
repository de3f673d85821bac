//! `engine` crate: workflow documents, graph queries, save-time validation,
//! the design-time context builder, rename propagation, and the runtime.

pub mod context;
pub mod dag;
pub mod error;
pub mod executor;
pub mod graph;
pub mod models;
pub mod rename;

pub use context::{build_context, BundleOptions, NamespaceSource, VariableNamespace};
pub use dag::{validate_dag, validate_registry};
pub use error::EngineError;
pub use executor::{builtin_registry, ExecutionResult, ExecutorConfig, NodeRegistry, WorkflowExecutor};
pub use graph::{downstream_of, upstream_of, Graph};
pub use models::{Edge, Node, Workflow};
pub use rename::propagate_rename;
