//! Postgres-backed [`StepStore`].

use async_trait::async_trait;
use nodes::{NodeError, StepKey, StepStore};
use serde_json::Value;
use tracing::debug;

use crate::repository::steps;
use crate::DbPool;

/// Step results in the `step_results` table, so runs survive restarts.
#[derive(Debug, Clone)]
pub struct PgStepStore {
    pool: DbPool,
}

impl PgStepStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl StepStore for PgStepStore {
    async fn load(&self, key: &StepKey) -> Result<Option<Value>, NodeError> {
        Ok(steps::load_step(&self.pool, key.run_id, &key.node_id, &key.step).await?)
    }

    async fn save(&self, key: &StepKey, output: &Value) -> Result<(), NodeError> {
        steps::save_step(&self.pool, key.run_id, &key.node_id, &key.step, output).await?;
        debug!(run_id = %key.run_id, node_id = %key.node_id, step = %key.step, "step result persisted");
        Ok(())
    }
}
