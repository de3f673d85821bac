//! `db` crate: Postgres persistence for workflow runs.
//!
//! Provides a connection pool, typed row structs, repository functions for
//! runs and step results, and [`PgStepStore`], the durable step store the
//! executor uses when runs must survive a process restart. No business logic
//! lives here.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use pool::{create_pool, run_migrations, DbPool};
pub use store::PgStepStore;
