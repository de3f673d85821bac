//! `CREATE_CONTACT`: upserts a CRM contact through an opaque record store.
//!
//! Both the lookup and the write are durable steps, so a retried run never
//! creates the same contact twice.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{ExecutableNode, NodeError, NodeInput};

/// Contact fields after template resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

/// The CRM's contact persistence, seen as opaque read/write calls.
///
/// Errors are treated as transient.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_contact_by_email(&self, email: &str) -> anyhow::Result<Option<Value>>;
    async fn create_contact(&self, contact: &NewContact) -> anyhow::Result<Value>;
}

/// Contacts kept in memory; for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    contacts: Mutex<Vec<Value>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contacts(&self) -> Vec<Value> {
        self.contacts.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_contact_by_email(&self, email: &str) -> anyhow::Result<Option<Value>> {
        let contacts = self
            .contacts
            .lock()
            .map_err(|_| anyhow::anyhow!("contact store lock poisoned"))?;
        Ok(contacts.iter().find(|c| c["email"] == email).cloned())
    }

    async fn create_contact(&self, contact: &NewContact) -> anyhow::Result<Value> {
        let mut record = serde_json::to_value(contact)?;
        if let Some(obj) = record.as_object_mut() {
            obj.insert("id".into(), json!(Uuid::new_v4().to_string()));
        }
        self.contacts
            .lock()
            .map_err(|_| anyhow::anyhow!("contact store lock poisoned"))?
            .push(record.clone());
        Ok(record)
    }
}

pub struct CreateContactNode {
    store: Arc<dyn RecordStore>,
}

impl CreateContactNode {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ExecutableNode for CreateContactNode {
    async fn execute(&self, input: &NodeInput<'_>) -> Result<Value, NodeError> {
        let contact = NewContact {
            name: input.require("name")?,
            email: input.require("email")?,
            phone: input.optional("phone")?,
            company: input.optional("company")?,
        };
        if !contact.email.contains('@') {
            return Err(NodeError::non_retriable(format!(
                "node '{}': '{}' is not an email address",
                input.node_id, contact.email
            )));
        }

        let store = &self.store;
        let email = contact.email.as_str();
        let existing: Option<Value> = input
            .steps
            .run("find-existing-contact", || async move {
                store.find_contact_by_email(email).await.map_err(NodeError::from)
            })
            .await?;

        if let Some(found) = existing {
            info!(node_id = input.node_id, email, "contact already exists");
            return Ok(json!({ "contact": found, "created": false }));
        }

        let new_contact = &contact;
        let created: Value = input
            .steps
            .run("create-contact", || async move {
                store.create_contact(new_contact).await.map_err(NodeError::from)
            })
            .await?;

        info!(node_id = input.node_id, email, "contact created");
        Ok(json!({ "contact": created, "created": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{InMemoryStepStore, StepRunner};
    use crate::{Context, NodeType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Record store that counts writes.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryRecordStore,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn find_contact_by_email(&self, email: &str) -> anyhow::Result<Option<Value>> {
            self.inner.find_contact_by_email(email).await
        }

        async fn create_contact(&self, contact: &NewContact) -> anyhow::Result<Value> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_contact(contact).await
        }
    }

    fn context() -> Context {
        Context::new().with_output(
            "form",
            json!({ "responses": { "Name": "Ada Lovelace", "Email": "ada@example.com" } }),
        )
    }

    fn data() -> serde_json::Map<String, Value> {
        json!({
            "variableName": "contact",
            "name": "{{form.responses.Name}}",
            "email": "{{form.responses.Email}}"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    async fn execute(
        node: &CreateContactNode,
        steps: &StepRunner,
        data: &serde_json::Map<String, Value>,
        context: &Context,
    ) -> Result<Value, NodeError> {
        let trigger = Value::Null;
        let input = NodeInput {
            run_id: steps.run_id(),
            node_id: "contact-1",
            node_type: NodeType::CreateContact,
            data,
            context,
            trigger: &trigger,
            steps,
        };
        node.execute(&input).await
    }

    #[tokio::test]
    async fn creates_contact_from_resolved_fields() {
        let store = Arc::new(CountingStore::default());
        let node = CreateContactNode::new(store.clone());
        let steps = StepRunner::new(Arc::new(InMemoryStepStore::new()), Uuid::new_v4(), "contact-1");

        let out = execute(&node, &steps, &data(), &context()).await.unwrap();

        assert_eq!(out["created"], true);
        assert_eq!(out["contact"]["name"], "Ada Lovelace");
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(steps.executed(), 2);
    }

    #[tokio::test]
    async fn existing_contact_is_not_duplicated() {
        let store = Arc::new(CountingStore::default());
        store
            .inner
            .create_contact(&NewContact {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                phone: None,
                company: None,
            })
            .await
            .unwrap();
        let node = CreateContactNode::new(store.clone());
        let steps = StepRunner::new(Arc::new(InMemoryStepStore::new()), Uuid::new_v4(), "contact-1");

        let out = execute(&node, &steps, &data(), &context()).await.unwrap();

        assert_eq!(out["created"], false);
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retried_attempt_replays_the_write() {
        let store = Arc::new(CountingStore::default());
        let node = CreateContactNode::new(store.clone());
        let step_store = Arc::new(InMemoryStepStore::new());
        let run_id = Uuid::new_v4();

        let first = StepRunner::new(step_store.clone(), run_id, "contact-1");
        execute(&node, &first, &data(), &context()).await.unwrap();

        let second = StepRunner::new(step_store, run_id, "contact-1");
        let out = execute(&node, &second, &data(), &context()).await.unwrap();

        assert_eq!(out["created"], true);
        assert_eq!(second.replayed(), 2);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.contacts().len(), 1);
    }

    #[tokio::test]
    async fn missing_upstream_variable_is_non_retriable() {
        let node = CreateContactNode::new(Arc::new(InMemoryRecordStore::new()));
        let steps = StepRunner::new(Arc::new(InMemoryStepStore::new()), Uuid::new_v4(), "contact-1");

        let err = execute(&node, &steps, &data(), &Context::new()).await.unwrap_err();

        assert!(matches!(err, NodeError::NonRetriable(_)));
        assert_eq!(steps.executed(), 0);
    }

    #[tokio::test]
    async fn malformed_email_is_non_retriable() {
        let node = CreateContactNode::new(Arc::new(InMemoryRecordStore::new()));
        let steps = StepRunner::new(Arc::new(InMemoryStepStore::new()), Uuid::new_v4(), "contact-1");
        let ctx = Context::new().with_output(
            "form",
            json!({ "responses": { "Name": "Ada", "Email": "not-an-email" } }),
        );

        let err = execute(&node, &steps, &data(), &ctx).await.unwrap_err();
        assert!(matches!(err, NodeError::NonRetriable(_)));
    }
}
