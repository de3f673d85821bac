//! `workflow_runs` repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{RunStatus, WorkflowRunRow};
use crate::DbError;

const RUN_COLUMNS: &str = "id, workflow_id, status, trigger, error, started_at, finished_at";

/// Record a new run in `running` status.
pub async fn create_run(
    pool: &PgPool,
    run_id: Uuid,
    workflow_id: Uuid,
    trigger: &serde_json::Value,
) -> Result<WorkflowRunRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRunRow>(&format!(
        r#"
        INSERT INTO workflow_runs (id, workflow_id, status, trigger, started_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {RUN_COLUMNS}
        "#
    ))
    .bind(run_id)
    .bind(workflow_id)
    .bind(RunStatus::Running.as_str())
    .bind(trigger)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a run by id.
pub async fn get_run(pool: &PgPool, run_id: Uuid) -> Result<WorkflowRunRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRunRow>(&format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1"))
        .bind(run_id)
        .fetch_optional(pool)
        .await?;

    row.ok_or(DbError::NotFound)
}

/// Move a run back to `running`, e.g. when it is resumed.
pub async fn reopen_run(pool: &PgPool, run_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE workflow_runs
        SET status = $1, error = NULL, finished_at = NULL
        WHERE id = $2
        "#,
    )
    .bind(RunStatus::Running.as_str())
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Mark a run finished with its terminal status and optional error message.
pub async fn finish_run(
    pool: &PgPool,
    run_id: Uuid,
    status: RunStatus,
    error: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE workflow_runs
        SET status = $1, error = $2, finished_at = $3
        WHERE id = $4
        "#,
    )
    .bind(status.as_str())
    .bind(error)
    .bind(Utc::now())
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(())
}
