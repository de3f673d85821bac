//! `step_results` repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::StepResultRow;
use crate::DbError;

/// Stored output of one step, if it completed.
pub async fn load_step(
    pool: &PgPool,
    run_id: Uuid,
    node_id: &str,
    step: &str,
) -> Result<Option<serde_json::Value>, DbError> {
    let output = sqlx::query_scalar::<_, serde_json::Value>(
        r#"
        SELECT output FROM step_results
        WHERE run_id = $1 AND node_id = $2 AND step = $3
        "#,
    )
    .bind(run_id)
    .bind(node_id)
    .bind(step)
    .fetch_optional(pool)
    .await?;

    Ok(output)
}

/// Persist a step's output. The first completion wins; later saves of the
/// same key are ignored.
pub async fn save_step(
    pool: &PgPool,
    run_id: Uuid,
    node_id: &str,
    step: &str,
    output: &serde_json::Value,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO step_results (run_id, node_id, step, output, completed_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (run_id, node_id, step) DO NOTHING
        "#,
    )
    .bind(run_id)
    .bind(node_id)
    .bind(step)
    .bind(output)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Every completed step of a run, oldest first.
pub async fn list_steps(pool: &PgPool, run_id: Uuid) -> Result<Vec<StepResultRow>, DbError> {
    let rows = sqlx::query_as::<_, StepResultRow>(
        r#"
        SELECT run_id, node_id, step, output, completed_at
        FROM step_results
        WHERE run_id = $1
        ORDER BY completed_at, node_id, step
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
