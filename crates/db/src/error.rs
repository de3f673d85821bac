//! Errors raised by the persistence layer.

use nodes::NodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A lookup by id matched no row.
    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Storage trouble is transient from a node's point of view.
impl From<DbError> for NodeError {
    fn from(err: DbError) -> Self {
        NodeError::retryable(format!("step store: {err}"))
    }
}
