//! SQL for the two run tables, one async function per statement.
//!
//! Functions borrow the pool and return `Result<_, DbError>`; callers decide
//! what a row means.

pub mod runs;
pub mod steps;
