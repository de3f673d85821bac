//! Built-in executors that do not depend on any third-party integration.

pub mod contact;
pub mod set_variables;
pub mod trigger;

pub use contact::{CreateContactNode, InMemoryRecordStore, NewContact, RecordStore};
pub use set_variables::SetVariablesNode;
pub use trigger::TriggerNode;
