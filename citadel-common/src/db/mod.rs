//! The store: all persistence behind a narrow interface.
//!
//! Queries live in per-entity modules; every operation is a single logical
//! transaction against the pool.

pub mod init;
pub mod retry;

mod feeds;
mod prompts;
mod timeline;
mod users;

use sqlx::SqlitePool;

/// Handle to the SQLite-backed store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Store { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Whether an sqlx error is a unique-constraint violation, detected from the
/// driver's error code rather than message matching.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
